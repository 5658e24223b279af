//! 저장소 어댑터.
//!
//! 코어가 정의한 협력자 trait(`CredentialStore`, `ResourceFactsProvider`,
//! `AuditSink`)의 Postgres 구현과 메모리 구현을 제공합니다.

mod audit;
mod memory;
mod resources;
mod users;

pub use audit::PgAuditSink;
pub use memory::{InMemoryCredentialStore, InMemoryResourceFacts};
pub use resources::{FactsSource, PgResourceFacts};
pub use users::PgCredentialStore;
