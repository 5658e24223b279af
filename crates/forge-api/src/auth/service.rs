//! 인증 서비스.
//!
//! 가입, 로그인, 로그아웃, 현재 사용자 확인, 토큰 갱신과
//! 계정 관리 작업을 저장소, 해셔, 토큰 관리자, 레지스트리 위에서 조합합니다.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use forge_core::{
    normalize_email, AuditEvent, AuditVerdict, CredentialStore, NewUser, UserId, UserRecord,
    UserUpdate,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    AuditRecorder, AuthError, PasswordHasher, PasswordPolicy, Permission, Principal, Role,
    RoleRegistry, TokenManager, TokenPair, TokenType,
};
use crate::metrics;

/// 가입 요청.
#[derive(Debug)]
pub struct Registration {
    pub email: String,
    pub password: SecretString,
    pub display_name: Option<String>,
    pub team_id: Option<Uuid>,
}

impl Registration {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
            display_name: None,
            team_id: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_team(mut self, team_id: Uuid) -> Self {
        self.team_id = Some(team_id);
        self
    }
}

/// 인증 결과 (주체 + 토큰 쌍).
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub principal: Principal,
    pub tokens: TokenPair,
}

/// 인증 서비스.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    policy: PasswordPolicy,
    tokens: Arc<TokenManager>,
    registry: Arc<RoleRegistry>,
    audit: AuditRecorder,
    require_verified_login: bool,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("policy", &self.policy)
            .field("require_verified_login", &self.require_verified_login)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: Arc<TokenManager>,
        registry: Arc<RoleRegistry>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            store,
            hasher,
            policy: PasswordPolicy::default(),
            tokens,
            registry,
            audit,
            require_verified_login: false,
        }
    }

    /// 비밀번호 정책 설정.
    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 이메일 미인증 계정의 로그인 차단 여부 설정.
    pub fn with_verified_login(mut self, required: bool) -> Self {
        self.require_verified_login = required;
        self
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    // ==================== 가입 / 로그인 ====================

    /// 신규 사용자 가입.
    ///
    /// 기본 역할을 부여하고 초기 토큰 쌍을 발급합니다.
    ///
    /// # Errors
    ///
    /// - `InvalidInput`: 이메일 형식 오류
    /// - `WeakPassword`: 비밀번호 정책 위반
    /// - `DuplicateEmail`: 이미 등록된 이메일
    #[instrument(skip_all)]
    pub async fn register(&self, registration: Registration) -> Result<AuthSession, AuthError> {
        let email = normalize_email(&registration.email);
        validate_email(&email)?;
        self.policy
            .check(registration.password.expose_secret())
            .map_err(AuthError::WeakPassword)?;

        let password_hash = self
            .hash_password(registration.password.expose_secret().to_string())
            .await?;

        let record = match self
            .store
            .insert_user(NewUser {
                email,
                password_hash,
                display_name: registration.display_name,
                roles: vec![self.registry.default_role().as_str().to_string()],
                team_id: registration.team_id,
            })
            .await
        {
            Ok(record) => record,
            Err(e) => {
                let err = AuthError::from(e);
                metrics::record_auth_operation("register", err.code());
                return Err(err);
            }
        };

        let principal = Principal::resolve(&record, &self.registry);
        let tokens = self.tokens.issue_pair(&principal).await?;

        info!(user_id = %record.id, "User registered");
        self.audit.record(AuditEvent::new(
            Some(record.id),
            "register",
            AuditVerdict::Success,
        ));
        metrics::record_auth_operation("register", "success");

        Ok(AuthSession { principal, tokens })
    }

    /// 로그인.
    ///
    /// 이메일이 없는 경우와 비밀번호가 틀린 경우를 구분하지 않습니다.
    /// 비밀번호가 맞더라도 비활성 계정은 `UserInactive`로 거부됩니다.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);
        let record = self.store.find_user_by_email(&email).await?;

        let Some(record) = record else {
            // 응답 시간으로 계정 존재 여부가 드러나지 않도록 더미 검증 수행
            self.verify_password(password.to_string(), None).await;
            return Err(self.login_failed(None, AuthError::InvalidCredentials));
        };

        if !self
            .verify_password(password.to_string(), Some(record.password_hash.clone()))
            .await
        {
            return Err(self.login_failed(Some(record.id), AuthError::InvalidCredentials));
        }

        if !record.is_active {
            return Err(self.login_failed(Some(record.id), AuthError::UserInactive));
        }

        if self.require_verified_login && !record.is_verified {
            return Err(self.login_failed(Some(record.id), AuthError::UserUnverified));
        }

        let record = self
            .store
            .update_user(record.id, UserUpdate::default().last_login_at(Utc::now()))
            .await?;

        let principal = Principal::resolve(&record, &self.registry);
        let tokens = self.tokens.issue_pair(&principal).await?;

        info!(user_id = %record.id, "User logged in");
        self.audit.record(AuditEvent::new(
            Some(record.id),
            "login",
            AuditVerdict::Success,
        ));
        metrics::record_auth_operation("login", "success");

        Ok(AuthSession { principal, tokens })
    }

    fn login_failed(&self, user_id: Option<UserId>, err: AuthError) -> AuthError {
        warn!(user_id = ?user_id.map(|id| id.to_string()), reason = err.code(), "Login failed");
        self.audit.record(
            AuditEvent::new(user_id, "login", AuditVerdict::Failure).with_reason(err.code()),
        );
        metrics::record_auth_operation("login", err.code());
        err
    }

    /// 로그아웃.
    ///
    /// Access Token을 폐기하고, Refresh Token이 주어지면 같은 사용자의 것인 경우 함께 폐기합니다.
    /// 폐기 목록은 토큰의 원래 만료 시각까지 유지됩니다.
    #[instrument(skip_all)]
    pub async fn logout(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let claims = self.tokens.verify(access_token, TokenType::Access).await?;
        let user_id = claims.user_id()?;
        self.tokens.revoke(&claims).await;

        if let Some(refresh_token) = refresh_token {
            match self.tokens.verify(refresh_token, TokenType::Refresh).await {
                Ok(refresh) if refresh.sub == claims.sub => {
                    self.tokens.revoke(&refresh).await;
                }
                Ok(_) => warn!(user_id = %user_id, "Refresh token subject mismatch on logout"),
                // 이미 만료/폐기된 Refresh Token은 무시
                Err(_) => {}
            }
        }

        info!(user_id = %user_id, "User logged out");
        self.audit.record(AuditEvent::new(
            Some(user_id),
            "logout",
            AuditVerdict::Success,
        ));
        metrics::record_auth_operation("logout", "success");
        Ok(())
    }

    /// 토큰으로 현재 사용자 확인.
    ///
    /// 토큰 발급 이후의 비활성화, 역할 변경을 반영하기 위해 매번 레코드를 다시 조회합니다.
    pub async fn current_user(&self, access_token: &str) -> Result<Principal, AuthError> {
        let claims = self.tokens.verify(access_token, TokenType::Access).await?;
        let record = self.load_active_user(claims.user_id()?).await?;
        Ok(Principal::resolve(&record, &self.registry))
    }

    /// Refresh Token으로 새 토큰 쌍 발급.
    ///
    /// 사용한 Refresh Token은 폐기되어 재사용할 수 없습니다.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh).await?;
        let record = self.load_active_user(claims.user_id()?).await?;
        let principal = Principal::resolve(&record, &self.registry);

        let tokens = self.tokens.rotate(&claims, &principal).await?;

        self.audit.record(AuditEvent::new(
            Some(record.id),
            "refresh",
            AuditVerdict::Success,
        ));
        metrics::record_auth_operation("refresh", "success");
        Ok(tokens)
    }

    // ==================== 비밀번호 ====================

    /// 비밀번호 변경. 현재 비밀번호 확인이 필요합니다.
    ///
    /// 변경 후 요청에 사용한 세션을 포함해 기존 세션 토큰이 모두 폐기됩니다.
    #[instrument(skip_all, fields(user_id = %principal.user_id))]
    pub async fn change_password(
        &self,
        principal: &Principal,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let record = self.load_active_user(principal.user_id).await?;

        if !self
            .verify_password(current_password.to_string(), Some(record.password_hash))
            .await
        {
            self.audit.record(
                AuditEvent::new(Some(record.id), "change_password", AuditVerdict::Failure)
                    .with_reason("INVALID_CREDENTIALS"),
            );
            return Err(AuthError::InvalidCredentials);
        }

        self.policy
            .check(new_password)
            .map_err(AuthError::WeakPassword)?;
        let hash = self.hash_password(new_password.to_string()).await?;
        self.store
            .update_user(record.id, UserUpdate::default().password_hash(hash))
            .await?;

        let revoked = self.tokens.revoke_sessions(record.id).await;
        info!(user_id = %record.id, revoked, "Password changed, sessions revoked");
        self.audit.record(AuditEvent::new(
            Some(record.id),
            "change_password",
            AuditVerdict::Success,
        ));
        Ok(())
    }

    /// 비밀번호 재설정 토큰 요청.
    ///
    /// 활성 사용자에게만 토큰을 발급합니다. 그 외에는 `None`이며,
    /// 호출 측은 두 경우를 구분 없이 응답해야 합니다.
    #[instrument(skip_all)]
    pub async fn request_password_reset(&self, email: &str) -> Result<Option<String>, AuthError> {
        let email = normalize_email(email);
        let Some(record) = self.store.find_user_by_email(&email).await? else {
            return Ok(None);
        };
        if !record.is_active {
            return Ok(None);
        }

        let principal = Principal::resolve(&record, &self.registry);
        let token = self.tokens.issue(
            &principal,
            TokenType::PasswordReset,
            self.tokens.ttl_for(TokenType::PasswordReset),
        )?;

        self.audit.record(AuditEvent::new(
            Some(record.id),
            "request_password_reset",
            AuditVerdict::Success,
        ));
        Ok(Some(token))
    }

    /// 재설정 토큰으로 비밀번호 재설정. 토큰은 한 번만 사용할 수 있습니다.
    ///
    /// 기존 세션 토큰은 모두 폐기됩니다.
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let claims = self
            .tokens
            .verify(reset_token, TokenType::PasswordReset)
            .await?;
        // 정책 위반으로 토큰이 소모되지 않도록 먼저 검사
        self.policy
            .check(new_password)
            .map_err(AuthError::WeakPassword)?;

        let record = self.load_active_user(claims.user_id()?).await?;
        self.tokens.consume(&claims).await?;

        let hash = self.hash_password(new_password.to_string()).await?;
        self.store
            .update_user(record.id, UserUpdate::default().password_hash(hash))
            .await?;

        let revoked = self.tokens.revoke_sessions(record.id).await;
        info!(user_id = %record.id, revoked, "Password reset, sessions revoked");
        self.audit.record(AuditEvent::new(
            Some(record.id),
            "reset_password",
            AuditVerdict::Success,
        ));
        Ok(())
    }

    // ==================== 이메일 인증 ====================

    /// 이메일 인증 토큰 발급.
    pub async fn issue_verification_token(&self, user_id: UserId) -> Result<String, AuthError> {
        let record = self.load_user(user_id).await?;
        let principal = Principal::resolve(&record, &self.registry);

        Ok(self.tokens.issue(
            &principal,
            TokenType::EmailVerification,
            self.tokens.ttl_for(TokenType::EmailVerification),
        )?)
    }

    /// 이메일 인증 완료. 토큰은 한 번만 사용할 수 있습니다.
    #[instrument(skip_all)]
    pub async fn verify_email(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self
            .tokens
            .verify(token, TokenType::EmailVerification)
            .await?;
        let record = self.load_user(claims.user_id()?).await?;
        self.tokens.consume(&claims).await?;

        let record = self
            .store
            .update_user(record.id, UserUpdate::default().verified(true))
            .await?;

        info!(user_id = %record.id, "Email verified");
        self.audit.record(AuditEvent::new(
            Some(record.id),
            "verify_email",
            AuditVerdict::Success,
        ));
        Ok(Principal::resolve(&record, &self.registry))
    }

    // ==================== 계정 관리 ====================

    /// 관리 대상 계정이 행위자보다 높은 우선순위의 역할을 가지면 거부.
    ///
    /// `manage_users` 권한이 있어도 자신보다 상위 역할의 계정은 관리할 수 없습니다.
    pub async fn require_outranks(
        &self,
        actor: &Principal,
        target: UserId,
    ) -> Result<(), AuthError> {
        let record = self.load_user(target).await?;
        let target_roles = Principal::resolve(&record, &self.registry).roles;

        let actor_rank = self.registry.highest_rank(&actor.roles);
        let target_rank = self.registry.highest_rank(&target_roles);
        if target_rank > actor_rank {
            warn!(
                user_id = %actor.user_id,
                target = %target,
                actor_rank,
                target_rank,
                "Account management denied by role rank"
            );
            return Err(AuthError::PermissionDenied {
                action: "manage_users".to_string(),
                resource: format!("user:{}", target),
            });
        }
        Ok(())
    }

    /// 계정 비활성화. 기존 토큰은 다음 `current_user` 호출부터 거부됩니다.
    pub async fn deactivate(&self, user_id: UserId) -> Result<Principal, AuthError> {
        self.update_account(user_id, "deactivate_user", UserUpdate::default().active(false))
            .await
    }

    /// 계정 재활성화.
    pub async fn reactivate(&self, user_id: UserId) -> Result<Principal, AuthError> {
        self.update_account(user_id, "reactivate_user", UserUpdate::default().active(true))
            .await
    }

    /// 역할 할당 (기존 역할 대체).
    ///
    /// 최소 하나의 역할이 필요하며, 레지스트리에 정의된 역할만 허용합니다.
    pub async fn assign_roles(&self, user_id: UserId, roles: &[Role]) -> Result<Principal, AuthError> {
        if roles.is_empty() {
            return Err(AuthError::InvalidInput(
                "최소 하나의 역할이 필요합니다".to_string(),
            ));
        }
        if let Some(role) = roles
            .iter()
            .find(|r| self.registry.definition(**r).is_none())
        {
            return Err(AuthError::InvalidInput(format!(
                "정의되지 않은 역할: {}",
                role
            )));
        }

        let mut names: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
        names.sort();
        names.dedup();

        self.update_account(user_id, "assign_roles", UserUpdate::default().roles(names))
            .await
    }

    /// 직접 부여 권한 설정 (기존 값 대체).
    pub async fn set_permission_overrides(
        &self,
        user_id: UserId,
        permissions: &[Permission],
    ) -> Result<Principal, AuthError> {
        let mut names: Vec<String> = permissions
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();
        names.sort();
        names.dedup();

        self.update_account(
            user_id,
            "set_permission_overrides",
            UserUpdate::default().permission_overrides(names),
        )
        .await
    }

    async fn update_account(
        &self,
        user_id: UserId,
        action: &'static str,
        update: UserUpdate,
    ) -> Result<Principal, AuthError> {
        let record = self.store.update_user(user_id, update).await?;

        info!(user_id = %user_id, action, "Account updated");
        self.audit.record(AuditEvent::new(
            Some(user_id),
            action,
            AuditVerdict::Success,
        ));
        Ok(Principal::resolve(&record, &self.registry))
    }

    // ==================== 내부 헬퍼 ====================

    async fn load_user(&self, user_id: UserId) -> Result<UserRecord, AuthError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// 토큰 주체의 활성 레코드 조회. 삭제된 사용자는 토큰 무효로 처리합니다.
    async fn load_active_user(&self, user_id: UserId) -> Result<UserRecord, AuthError> {
        let record = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !record.is_active {
            return Err(AuthError::UserInactive);
        }
        Ok(record)
    }

    /// 블로킹 스레드 풀에서 비밀번호 해싱.
    async fn hash_password(&self, plaintext: String) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let started = Instant::now();

        let result = tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| AuthError::Internal(format!("해싱 태스크 실행 실패: {}", e)))?
            .map_err(|e| AuthError::Internal(e.to_string()));

        metrics::record_password_hash_duration(started.elapsed().as_secs_f64());
        result
    }

    /// 블로킹 스레드 풀에서 비밀번호 검증. 해시가 없으면 더미 검증 후 `false`.
    async fn verify_password(&self, plaintext: String, digest: Option<String>) -> bool {
        let hasher = self.hasher.clone();
        let started = Instant::now();

        let matched = tokio::task::spawn_blocking(move || match digest {
            Some(digest) => hasher.verify(&plaintext, &digest),
            None => hasher.verify_dummy(&plaintext),
        })
        .await
        .unwrap_or(false);

        metrics::record_password_hash_duration(started.elapsed().as_secs_f64());
        matched
    }
}

/// 최소한의 이메일 형식 검사. 상세 검증은 요청 경계에서 수행합니다.
fn validate_email(email: &str) -> Result<(), AuthError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !email.contains(' ')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AuthError::InvalidInput(format!(
            "잘못된 이메일 형식: {}",
            email
        )))
    }
}
