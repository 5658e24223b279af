//! # Forge Core
//!
//! AgileForge의 핵심 도메인 모델 및 협력자(collaborator) 계약을 제공합니다.
//!
//! 이 크레이트는 인증/인가 계층 전반에서 사용되는 기본 타입을 제공합니다:
//! - 사용자 레코드 및 자격증명 저장소 trait
//! - 리소스 타입 및 소유/배정 관계
//! - 감사(audit) 이벤트 및 감사 싱크 trait
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
