use std::future::Future;

use eco_proto::FinalCodeResponse;
use thiserror::Error;

use crate::rest::RestError;

pub trait FinalCodeApi: Send + Sync + 'static {
    fn validate_final_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<FinalCodeResponse, RestError>> + Send;
}

#[derive(Debug, Error)]
pub enum FinalCodeError {
    #[error("enter a code first")]
    Empty,
    #[error(transparent)]
    Rest(#[from] RestError),
}

/// Normalize a typed code the way the server compares it.
pub fn prepare_final_code(raw: &str) -> Result<String, FinalCodeError> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() {
        return Err(FinalCodeError::Empty);
    }
    Ok(code)
}

pub async fn submit_final_code<A: FinalCodeApi>(
    api: &A,
    raw: &str,
) -> Result<FinalCodeResponse, FinalCodeError> {
    let code = prepare_final_code(raw)?;
    let response = api.validate_final_code(&code).await?;
    tracing::info!(
        target: "eco_quest::final_code",
        success = response.success,
        "final_code.checked"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_trimmed_and_uppercased() {
        assert_eq!(prepare_final_code("  terre 2025 ").unwrap(), "TERRE 2025");
        assert!(matches!(prepare_final_code(" \t"), Err(FinalCodeError::Empty)));
    }

    struct Echo;

    impl FinalCodeApi for Echo {
        async fn validate_final_code(&self, code: &str) -> Result<FinalCodeResponse, RestError> {
            Ok(FinalCodeResponse {
                success: code == "OPEN",
                message: code.to_string(),
                redirect: None,
            })
        }
    }

    #[tokio::test]
    async fn submit_sends_normalized_code() {
        let response = submit_final_code(&Echo, " open ").await.unwrap();
        assert!(response.success);
        assert_eq!(response.message, "OPEN");
        assert!(matches!(
            submit_final_code(&Echo, "").await,
            Err(FinalCodeError::Empty)
        ));
    }
}
