use crate::config::ValidationOptions;
use crate::error::Result;
use crate::network::Fetcher;
use crate::session::ValidationSession;
use crate::validation::RichValidationResult;

/// Validate every document timestamp in `pdf`, in document order.
///
/// Pass `None` for `fetcher` to validate offline against the DSS only.
pub async fn validate_timestamps(
    pdf: &[u8],
    options: &ValidationOptions,
    fetcher: Option<&Fetcher>,
) -> Result<Vec<RichValidationResult>> {
    let mut session = ValidationSession::new(options.clone());
    if session.start(pdf)? == 0 {
        log::info!("No document timestamps found");
    }
    session.validate_all(fetcher).await?;
    Ok(session.finish()?.to_vec())
}
