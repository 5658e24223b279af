//! JWT 토큰 처리.
//!
//! Access/Refresh/비밀번호 재설정/이메일 인증 토큰의 발급, 검증, 폐기.
//!
//! 토큰 수명: 발급 → 유효 → (만료 | 폐기) → 거부.
//! 만료 시각과 같은 시점의 토큰은 만료된 것으로 처리합니다.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use forge_core::{AuthConfig, UserId};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Principal, RevocationList};

/// 토큰 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
    PasswordReset,
    EmailVerification,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::PasswordReset => "password_reset",
            TokenType::EmailVerification => "email_verification",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// JWT 페이로드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 사용자 ID
    pub sub: String,
    /// 사용자 이메일
    pub email: String,
    /// 발급 시점의 역할 (참고용, 인가에는 사용하지 않음)
    pub roles: Vec<String>,
    /// 토큰 종류
    pub typ: TokenType,
    /// Issued At - 토큰 발급 시간 (Unix timestamp)
    pub iat: i64,
    /// Expiration - 토큰 만료 시간 (Unix timestamp)
    pub exp: i64,
    /// JWT ID - 토큰 고유 식별자
    pub jti: String,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Subject를 사용자 ID로 파싱.
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        UserId::parse(&self.sub).ok_or(TokenError::Malformed)
    }

    /// 만료 시각.
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// 주어진 시각 기준 만료 여부 (`now >= exp`).
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// Access Token + Refresh Token 페어.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    /// Access Token
    pub access_token: String,
    /// Refresh Token
    pub refresh_token: String,
    /// Access Token 만료 시간 (초)
    pub expires_in: i64,
    /// 토큰 타입 (항상 "Bearer")
    pub token_type: String,
}

/// 토큰 처리 에러.
///
/// 외부로는 모두 `AuthError::InvalidToken`으로 합쳐집니다.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("토큰이 만료되었습니다")]
    Expired,
    #[error("잘못된 토큰 형식")]
    Malformed,
    #[error("토큰 서명 불일치")]
    BadSignature,
    #[error("토큰 종류 불일치: 기대 {expected}, 실제 {actual}")]
    WrongType {
        expected: TokenType,
        actual: TokenType,
    },
    #[error("폐기된 토큰")]
    Revoked,
    #[error("유효 기간은 0보다 커야 합니다")]
    InvalidTtl,
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

/// 토큰 발급/검증기.
///
/// 프로세스 전역 서명 키 하나로 HS256 서명을 수행합니다.
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    reset_ttl: Duration,
    verification_ttl: Duration,
    revocations: Arc<dyn RevocationList>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// 서명 키와 발급자로 생성. 유효 기간은 기본값을 사용합니다.
    pub fn new(
        secret: &SecretString,
        issuer: impl Into<String>,
        revocations: Arc<dyn RevocationList>,
    ) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            issuer: issuer.into(),
            access_ttl: Duration::minutes(30),
            refresh_ttl: Duration::days(7),
            reset_ttl: Duration::minutes(30),
            verification_ttl: Duration::hours(48),
            revocations,
        }
    }

    /// 인증 설정에서 생성.
    pub fn from_config(config: &AuthConfig, revocations: Arc<dyn RevocationList>) -> Self {
        Self::new(&config.jwt_secret, config.issuer.clone(), revocations)
            .with_ttl(TokenType::Access, Duration::minutes(config.access_ttl_minutes))
            .with_ttl(TokenType::Refresh, Duration::days(config.refresh_ttl_days))
            .with_ttl(
                TokenType::PasswordReset,
                Duration::minutes(config.reset_ttl_minutes),
            )
            .with_ttl(
                TokenType::EmailVerification,
                Duration::hours(config.verification_ttl_hours),
            )
    }

    /// 토큰 종류별 기본 유효 기간 설정.
    pub fn with_ttl(mut self, token_type: TokenType, ttl: Duration) -> Self {
        match token_type {
            TokenType::Access => self.access_ttl = ttl,
            TokenType::Refresh => self.refresh_ttl = ttl,
            TokenType::PasswordReset => self.reset_ttl = ttl,
            TokenType::EmailVerification => self.verification_ttl = ttl,
        }
        self
    }

    /// 토큰 종류별 기본 유효 기간.
    pub fn ttl_for(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
            TokenType::PasswordReset => self.reset_ttl,
            TokenType::EmailVerification => self.verification_ttl,
        }
    }

    /// 토큰 발급 (현재 시각 기준).
    pub fn issue(
        &self,
        principal: &Principal,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.issue_at(principal, token_type, ttl, Utc::now())
    }

    /// 지정 시각 기준 토큰 발급.
    ///
    /// # Arguments
    ///
    /// * `principal` - 토큰 주체
    /// * `token_type` - 토큰 종류
    /// * `ttl` - 유효 기간 (0보다 커야 함)
    /// * `now` - 발급 시각
    pub fn issue_at(
        &self,
        principal: &Principal,
        token_type: TokenType,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.sign(principal, token_type, ttl, now)
            .map(|(token, _)| token)
    }

    fn sign(
        &self,
        principal: &Principal,
        token_type: TokenType,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(String, Claims), TokenError> {
        let iat = now.timestamp();
        let exp = now
            .checked_add_signed(ttl)
            .ok_or(TokenError::InvalidTtl)?
            .timestamp();
        if exp <= iat {
            return Err(TokenError::InvalidTtl);
        }

        let claims = Claims {
            sub: principal.user_id.to_string(),
            email: principal.email.clone(),
            roles: principal.role_names(),
            typ: token_type,
            iat,
            exp,
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok((token, claims))
    }

    /// Access Token + Refresh Token 쌍 발급.
    ///
    /// 두 토큰은 사용자 세션으로 기록되어 `revoke_sessions`로 일괄 폐기할 수 있습니다.
    pub async fn issue_pair(&self, principal: &Principal) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        let (access_token, access) = self.sign(principal, TokenType::Access, self.access_ttl, now)?;
        let (refresh_token, refresh) =
            self.sign(principal, TokenType::Refresh, self.refresh_ttl, now)?;

        for claims in [&access, &refresh] {
            self.revocations
                .track(&claims.sub, &claims.jti, claims.expires_at())
                .await;
        }

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
            token_type: "Bearer".to_string(),
        })
    }

    /// 토큰 검증 (현재 시각 기준).
    pub async fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        self.verify_at(token, expected, Utc::now()).await
    }

    /// 지정 시각 기준 토큰 검증.
    ///
    /// 서명, 발급자, 만료, 종류, 폐기 여부를 순서대로 확인합니다.
    pub async fn verify_at(
        &self,
        token: &str,
        expected: TokenType,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;

        if claims.is_expired_at(now) || claims.exp <= claims.iat {
            return Err(TokenError::Expired);
        }

        if claims.typ != expected {
            return Err(TokenError::WrongType {
                expected,
                actual: claims.typ,
            });
        }

        if self.revocations.is_revoked(&claims.jti).await {
            return Err(TokenError::Revoked);
        }

        Ok(claims)
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            })
    }

    /// 토큰 폐기. 이미 폐기된 토큰이면 `false`.
    pub async fn revoke(&self, claims: &Claims) -> bool {
        self.revocations
            .revoke(&claims.jti, claims.expires_at())
            .await
    }

    /// 사용자에게 발급된 모든 세션 토큰 폐기. 폐기된 개수를 반환합니다.
    pub async fn revoke_sessions(&self, user_id: UserId) -> usize {
        self.revocations.revoke_subject(&user_id.to_string()).await
    }

    /// 일회용 토큰 소비.
    ///
    /// 검증 이후 만료된 토큰은 `Expired`, 이미 소비된 토큰은 `Revoked`.
    pub async fn consume(&self, claims: &Claims) -> Result<(), TokenError> {
        if claims.is_expired_at(Utc::now()) {
            return Err(TokenError::Expired);
        }
        if self.revoke(claims).await {
            Ok(())
        } else {
            Err(TokenError::Revoked)
        }
    }

    /// Refresh Token 회전.
    ///
    /// 기존 Refresh Token을 폐기한 뒤 새 토큰 쌍을 발급합니다.
    /// 동시에 같은 토큰으로 회전을 시도하면 하나만 성공합니다.
    pub async fn rotate(
        &self,
        refresh_claims: &Claims,
        principal: &Principal,
    ) -> Result<TokenPair, TokenError> {
        if refresh_claims.typ != TokenType::Refresh {
            return Err(TokenError::WrongType {
                expected: TokenType::Refresh,
                actual: refresh_claims.typ,
            });
        }
        self.consume(refresh_claims).await?;
        self.issue_pair(principal).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{InMemoryRevocationList, Role};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    fn manager() -> TokenManager {
        TokenManager::new(
            &SecretString::from(TEST_SECRET.to_string()),
            "agileforge",
            Arc::new(InMemoryRevocationList::new()),
        )
    }

    fn principal() -> Principal {
        Principal {
            user_id: UserId::new(),
            email: "a@x.com".to_string(),
            roles: [Role::Developer].into(),
            overrides: BTreeSet::new(),
            permissions: BTreeSet::new(),
            team_id: None,
            is_verified: false,
        }
    }

    #[tokio::test]
    async fn test_issue_and_verify_token() {
        let tokens = manager();
        let principal = principal();

        let token = tokens
            .issue(&principal, TokenType::Access, Duration::minutes(5))
            .unwrap();
        let claims = tokens.verify(&token, TokenType::Access).await.unwrap();

        assert_eq!(claims.user_id().unwrap(), principal.user_id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.roles, vec!["developer".to_string()]);
        assert_eq!(claims.iss, "agileforge");
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn test_token_pair() {
        let tokens = manager().with_ttl(TokenType::Access, Duration::minutes(15));
        let pair = tokens.issue_pair(&principal()).await.unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 15 * 60);
        assert!(tokens.verify(&pair.access_token, TokenType::Access).await.is_ok());
        assert!(tokens.verify(&pair.refresh_token, TokenType::Refresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_token_rejected_as_access() {
        let tokens = manager();
        let pair = tokens.issue_pair(&principal()).await.unwrap();

        let result = tokens.verify(&pair.refresh_token, TokenType::Access).await;
        assert!(matches!(
            result,
            Err(TokenError::WrongType {
                expected: TokenType::Access,
                actual: TokenType::Refresh
            })
        ));
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let tokens = manager();
        let issued_at = Utc::now();
        let token = tokens
            .issue_at(&principal(), TokenType::Access, Duration::seconds(60), issued_at)
            .unwrap();

        let just_before = issued_at + Duration::seconds(59);
        let exactly = issued_at + Duration::seconds(60);

        assert!(tokens
            .verify_at(&token, TokenType::Access, just_before)
            .await
            .is_ok());
        assert!(matches!(
            tokens.verify_at(&token, TokenType::Access, exactly).await,
            Err(TokenError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_one_second_token_expires() {
        let tokens = manager();
        let token = tokens
            .issue(&principal(), TokenType::Access, Duration::seconds(1))
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;

        assert!(matches!(
            tokens.verify(&token, TokenType::Access).await,
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let tokens = manager();
        assert!(matches!(
            tokens.issue(&principal(), TokenType::Access, Duration::zero()),
            Err(TokenError::InvalidTtl)
        ));
        assert!(matches!(
            tokens.issue(&principal(), TokenType::Access, Duration::seconds(-5)),
            Err(TokenError::InvalidTtl)
        ));
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let tokens = manager();
        let token = tokens
            .issue(&principal(), TokenType::Access, Duration::minutes(5))
            .unwrap();

        let other = TokenManager::new(
            &SecretString::from("wrong-secret-key-for-testing-minimum-32-chars".to_string()),
            "agileforge",
            Arc::new(InMemoryRevocationList::new()),
        );
        assert!(matches!(
            other.verify(&token, TokenType::Access).await,
            Err(TokenError::BadSignature)
        ));
    }

    #[tokio::test]
    async fn test_wrong_issuer_rejected() {
        let tokens = manager();
        let token = tokens
            .issue(&principal(), TokenType::Access, Duration::minutes(5))
            .unwrap();

        let other = TokenManager::new(
            &SecretString::from(TEST_SECRET.to_string()),
            "someone-else",
            Arc::new(InMemoryRevocationList::new()),
        );
        assert!(other.verify(&token, TokenType::Access).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let tokens = manager();
        assert!(matches!(
            tokens.verify("invalid.token.here", TokenType::Access).await,
            Err(TokenError::Malformed)
        ));
        assert!(tokens.verify("", TokenType::Access).await.is_err());
    }

    #[tokio::test]
    async fn test_revoked_token_rejected() {
        let tokens = manager();
        let token = tokens
            .issue(&principal(), TokenType::Access, Duration::minutes(5))
            .unwrap();
        let claims = tokens.verify(&token, TokenType::Access).await.unwrap();

        assert!(tokens.revoke(&claims).await);
        assert!(matches!(
            tokens.verify(&token, TokenType::Access).await,
            Err(TokenError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_rotation_prevents_reuse() {
        let tokens = manager();
        let principal = principal();
        let pair = tokens.issue_pair(&principal).await.unwrap();
        let claims = tokens
            .verify(&pair.refresh_token, TokenType::Refresh)
            .await
            .unwrap();

        let rotated = tokens.rotate(&claims, &principal).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        // 회전된 토큰은 재사용 불가
        assert!(matches!(
            tokens.verify(&pair.refresh_token, TokenType::Refresh).await,
            Err(TokenError::Revoked)
        ));
        assert!(matches!(
            tokens.rotate(&claims, &principal).await,
            Err(TokenError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let tokens = manager();
        let token = tokens
            .issue(&principal(), TokenType::PasswordReset, Duration::minutes(30))
            .unwrap();
        let claims = tokens
            .verify(&token, TokenType::PasswordReset)
            .await
            .unwrap();

        assert!(tokens.consume(&claims).await.is_ok());
        assert!(matches!(
            tokens.consume(&claims).await,
            Err(TokenError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_claims_expiring_after_verify_cannot_be_consumed() {
        let tokens = manager().with_ttl(TokenType::Refresh, Duration::seconds(1));
        let principal = principal();
        let pair = tokens.issue_pair(&principal).await.unwrap();
        let claims = tokens
            .verify(&pair.refresh_token, TokenType::Refresh)
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

        // 만료 이후에는 몇 번을 시도해도 회전/소비 불가
        assert!(matches!(
            tokens.rotate(&claims, &principal).await,
            Err(TokenError::Expired)
        ));
        assert!(matches!(
            tokens.rotate(&claims, &principal).await,
            Err(TokenError::Expired)
        ));
        assert!(matches!(
            tokens.consume(&claims).await,
            Err(TokenError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_revoke_sessions_ends_every_issued_pair() {
        let tokens = manager();
        let principal = principal();
        let first = tokens.issue_pair(&principal).await.unwrap();
        let second = tokens.issue_pair(&principal).await.unwrap();
        let other = tokens
            .issue_pair(&Principal {
                user_id: UserId::new(),
                ..principal.clone()
            })
            .await
            .unwrap();

        assert_eq!(tokens.revoke_sessions(principal.user_id).await, 4);

        for pair in [&first, &second] {
            assert!(matches!(
                tokens.verify(&pair.access_token, TokenType::Access).await,
                Err(TokenError::Revoked)
            ));
            assert!(matches!(
                tokens.verify(&pair.refresh_token, TokenType::Refresh).await,
                Err(TokenError::Revoked)
            ));
        }
        assert!(tokens.verify(&other.access_token, TokenType::Access).await.is_ok());

        // 이후 발급된 세션은 영향 없음
        let fresh = tokens.issue_pair(&principal).await.unwrap();
        assert!(tokens.verify(&fresh.access_token, TokenType::Access).await.is_ok());
    }

    #[test]
    fn test_huge_ttl_rejected_without_overflow() {
        let tokens = manager();
        assert!(matches!(
            tokens.issue(&principal(), TokenType::Access, Duration::days(365 * 1_000_000)),
            Err(TokenError::InvalidTtl)
        ));
    }

    #[test]
    fn test_from_config_ttls() {
        let config = AuthConfig::with_secret(TEST_SECRET);
        let tokens = TokenManager::from_config(&config, Arc::new(InMemoryRevocationList::new()));

        assert_eq!(tokens.ttl_for(TokenType::Access), Duration::minutes(30));
        assert_eq!(tokens.ttl_for(TokenType::Refresh), Duration::days(7));
        assert_eq!(tokens.ttl_for(TokenType::PasswordReset), Duration::minutes(30));
        assert_eq!(tokens.ttl_for(TokenType::EmailVerification), Duration::hours(48));
        assert!(!format!("{:?}", tokens).contains(TEST_SECRET));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_any_tampered_byte_fails_verification(index in any::<prop::sample::Index>()) {
            let tokens = manager();
            let token = tokens
                .issue(&principal(), TokenType::Access, Duration::minutes(5))
                .unwrap();

            let bytes = token.as_bytes();
            let i = index.index(bytes.len());
            prop_assume!(bytes[i] != b'.');

            let replacement = if bytes[i] == b'A' { 'B' } else { 'A' };
            let mut tampered = token.clone();
            tampered.replace_range(i..=i, &replacement.to_string());

            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let result = rt.block_on(tokens.verify(&tampered, TokenType::Access));
            prop_assert!(result.is_err());
        }
    }
}
