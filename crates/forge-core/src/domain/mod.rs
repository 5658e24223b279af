//! 인증/인가를 위한 도메인 모델 및 외부 협력자 계약.

mod audit;
mod resource;
mod store;
mod user;

pub use audit::*;
pub use resource::*;
pub use store::*;
pub use user::*;
