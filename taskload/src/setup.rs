//! One-off setup before load starts: register a technician and log both roles in.
use crate::api::{log_body, ApiResponse, Login, NewUser, TaskApi};
use crate::checks::Check;
use crate::error::DriverError;
use crate::random::random_string;
use crate::recorder::Recorder;
use rand::Rng;
use serde_json::Value;
use taskload_core::{
    RunConfig, SetupFailurePolicy, EMAIL_DOMAIN, EMAIL_LOCAL_LEN, LOWERCASE_ALPHABET,
    NICKNAME_LEN,
};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Bearer tokens shared read-only by every VU for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Freshly registered account; creates, updates and reads tasks.
    pub tech: String,
    /// Pre-existing account; deletes tasks.
    pub manager: String,
}

/// Runs once per run. Failures are recorded as checks; with
/// [`SetupFailurePolicy::Continue`] the run proceeds with whatever tokens came back (possibly
/// empty), so downstream requests fail authorization and that gets measured too.
#[instrument(name = "setup", skip_all)]
pub async fn setup<A, R>(
    api: &A,
    config: &RunConfig,
    recorder: &Recorder,
    rng: &mut R,
) -> Result<Credentials, DriverError>
where
    A: TaskApi + Sync,
    R: Rng + Send,
{
    let nickname = random_string(rng, NICKNAME_LEN, LOWERCASE_ALPHABET);
    let email = format!(
        "{}@{EMAIL_DOMAIN}",
        random_string(rng, EMAIL_LOCAL_LEN, LOWERCASE_ALPHABET)
    );
    let password = &config.accounts.password;
    let mut failures = vec![];

    let user = NewUser {
        nickname,
        email: email.clone(),
        password: password.clone(),
    };
    let res = api.register(&user).await;
    if !recorder.check(Check::CreateUser, res.status == 201) {
        warn!(
            status = res.status,
            body = log_body(&res.body),
            "Unable to register {email}"
        );
        failures.push(format!("registering {email} returned {}", res.status));
    }

    let tech = login(api, recorder, Check::TechLogin, &email, password, &mut failures).await;
    let manager = login(
        api,
        recorder,
        Check::ManagerLogin,
        &config.accounts.manager_email,
        password,
        &mut failures,
    )
    .await;

    if failures.is_empty() {
        info!("Setup complete for {email}");
    } else if config.setup_failure == SetupFailurePolicy::Abort {
        return Err(DriverError::Setup(failures.join("; ")));
    } else {
        warn!("Setup incomplete, continuing with degraded credentials");
    }

    Ok(Credentials { tech, manager })
}

async fn login<A: TaskApi + Sync>(
    api: &A,
    recorder: &Recorder,
    check: Check,
    email: &str,
    password: &str,
    failures: &mut Vec<String>,
) -> String {
    let res = api
        .login(&Login {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await;

    let token = token_from_login(&res);
    if !recorder.check(check, token.is_some()) {
        warn!(
            status = res.status,
            body = log_body(&res.body),
            "Unable to log in as {email}"
        );
        failures.push(format!("login as {email} returned {}", res.status));
    }

    token.unwrap_or_default()
}

/// The login body is a bare JSON string, an object with a `token` field, or the raw token.
pub fn token_from_login(res: &ApiResponse) -> Option<String> {
    if !(200..300).contains(&res.status) {
        return None;
    }

    let token = match serde_json::from_str::<Value>(&res.body) {
        Ok(Value::String(token)) => token,
        Ok(Value::Object(map)) => map.get("token")?.as_str()?.to_string(),
        Ok(_) => return None,
        Err(_) => res.body.trim().to_string(),
    };

    (!token.is_empty()).then_some(token)
}
