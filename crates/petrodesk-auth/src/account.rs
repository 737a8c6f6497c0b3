//! Account self-service: MFA management, password and profile changes.
//!
//! All of these are ordinary authenticated requests, so they get CSRF and
//! 401 recovery from the pipeline and count as session activity.

use petrodesk_protocol::{
    BackupCodes, ChangePasswordRequest, Codec, MfaCodeRequest, MfaDisableRequest, MfaSetup,
    MfaStatus, ProfileUpdate, User, UserData,
};
use petrodesk_transport::HttpTransport;
use tracing::info;

use crate::{AuthError, AuthSession, RequestOptions};

impl<T: HttpTransport> AuthSession<T> {
    /// Whether MFA is on and how many backup codes are left.
    pub async fn mfa_status(&self) -> Result<MfaStatus, AuthError> {
        let path = &self.config.endpoints.mfa_status;
        let response = self
            .make_authenticated_request(path, RequestOptions::get())
            .await?;
        self.expect_data(&response, "cannot load MFA status")
    }

    /// Starts MFA enrollment and returns the TOTP secret to show the user.
    pub async fn mfa_setup(&self) -> Result<MfaSetup, AuthError> {
        let path = &self.config.endpoints.mfa_setup;
        let response = self
            .make_authenticated_request(path, RequestOptions::post())
            .await?;
        self.expect_data(&response, "MFA setup failed")
    }

    /// Confirms enrollment with a first TOTP code. Returns the one-time
    /// backup codes.
    pub async fn mfa_verify_setup(&self, code: &str) -> Result<BackupCodes, AuthError> {
        let path = &self.config.endpoints.mfa_verify_setup;
        let body = self.codec.to_value(&MfaCodeRequest {
            code: code.to_string(),
        })?;
        let response = self
            .make_authenticated_request(path, RequestOptions::post().json(body))
            .await?;
        let codes: BackupCodes = self.expect_data(&response, "MFA verification failed")?;

        self.update_user(|user| user.mfa_enabled = true);
        info!("MFA enabled");
        Ok(codes)
    }

    /// Turns MFA off. Needs the password and a current code.
    pub async fn mfa_disable(&self, password: &str, code: &str) -> Result<(), AuthError> {
        let path = &self.config.endpoints.mfa_disable;
        let body = self.codec.to_value(&MfaDisableRequest {
            password: password.to_string(),
            code: code.to_string(),
        })?;
        let response = self
            .make_authenticated_request(path, RequestOptions::delete().json(body))
            .await?;
        self.expect_success(&response, "cannot disable MFA")?;

        self.update_user(|user| user.mfa_enabled = false);
        info!("MFA disabled");
        Ok(())
    }

    /// Replaces every backup code with a fresh set.
    pub async fn regenerate_backup_codes(&self, code: &str) -> Result<BackupCodes, AuthError> {
        let path = &self.config.endpoints.mfa_regenerate_backup_codes;
        let body = self.codec.to_value(&MfaCodeRequest {
            code: code.to_string(),
        })?;
        let response = self
            .make_authenticated_request(path, RequestOptions::post().json(body))
            .await?;
        self.expect_data(&response, "cannot regenerate backup codes")
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let path = &self.config.endpoints.change_password;
        let body = self.codec.to_value(&ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        })?;
        let response = self
            .make_authenticated_request(path, RequestOptions::post().json(body))
            .await?;
        self.expect_success(&response, "cannot change password")?;
        info!("password changed");
        Ok(())
    }

    /// Updates name/email/phone and adopts the user the server returns.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, AuthError> {
        let path = &self.config.endpoints.update_profile;
        let body = self.codec.to_value(update)?;
        let response = self
            .make_authenticated_request(path, RequestOptions::put().json(body))
            .await?;
        let data: UserData = self.expect_data(&response, "cannot update profile")?;

        self.set_user(data.user.clone());
        Ok(data.user)
    }
}
