// Public modules
pub mod conversation_turn;
pub mod device;
pub mod generate_request;
pub mod generate_response;
pub mod generation_params;
pub mod server_info;

// Re-exports
pub use conversation_turn::{ConversationTurn, Role};
pub use device::{Device, Quantization};
pub use generate_request::{GenerateParameters, GenerateRequest};
pub use generate_response::{GenerateResponse, ServerErrorBody};
pub use generation_params::{
    DEFAULT_MAX_INPUT_TOKENS, DEFAULT_MAX_NEW_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
    GenerationParams,
};
pub use server_info::ServerInfo;
