use std::sync::Arc;
use sqlx::{Pool, Sqlite};
use tokio::task::JoinHandle;
use crate::config::Config;
use crate::crypto::ResetTokenSigner;
use crate::error::AppError;
use crate::mail::{LogTransport, MailSettings, Mailer};
use crate::search::{self, IndexSynchronizer};

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub config: Arc<Config>,
    pub index: IndexSynchronizer,
    pub mailer: Mailer,
    pub tokens: Arc<ResetTokenSigner>,
}

impl AppState {
    /// Wire up the search backend, mail worker and token signer for `db`.
    ///
    /// Must be called inside a Tokio runtime. The returned handle is the mail
    /// worker; it finishes once every clone of the state is dropped and the
    /// queue is drained.
    pub fn from_config(db: Pool<Sqlite>, config: Arc<Config>) -> Result<(Self, JoinHandle<()>), AppError> {
        let index = IndexSynchronizer::new(search::connect(&config)?);
        let (mailer, mail_worker) = Mailer::spawn(Arc::new(LogTransport), MailSettings::from_config(&config));
        let tokens = Arc::new(ResetTokenSigner::from_secret(
            &config.secret_key,
            config.reset_token_ttl_secs,
        )?);

        let state = AppState {
            db,
            config,
            index,
            mailer,
            tokens,
        };
        Ok((state, mail_worker))
    }
}
