use std::time::Duration;

use isahc::{AsyncBody, Request, RequestExt, Response, config::Configurable};

use crate::Error;

#[derive(Clone)]
pub(crate) struct HttpClient {
    inner: isahc::HttpClient,
    max_attempts: usize,
    initial_delay: Duration,
}

impl HttpClient {
    pub fn new(max_attempts: usize, initial_delay: Duration) -> Result<Self, Error> {
        let inner = isahc::HttpClient::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .default_header(
                "user-agent",
                format!("finauth/{}", env!("CARGO_PKG_VERSION")),
            )
            .build()?;

        Ok(Self {
            inner,
            max_attempts: max_attempts.max(1),
            initial_delay,
        })
    }

    /// Sends the request, retrying transport failures with exponential backoff.
    /// HTTP error statuses are returned as responses, not retried.
    pub async fn send_async<B>(&self, request: Request<B>) -> Result<Response<AsyncBody>, Error>
    where
        B: Into<AsyncBody> + Clone + Send + Sync + 'static,
    {
        let mut delay = self.initial_delay;
        let body = request.body().clone();

        for attempt in 1..self.max_attempts {
            let current_request = request
                .to_builder()
                .body(body.clone())
                .map_err(|err| Error::internal(format!("invalid request: {err}"), "bad_request"))?;

            match self.inner.send_async(current_request).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(
                        "http client attempt {}/{} failed: {}",
                        attempt, self.max_attempts, err
                    );

                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                        delay = delay.saturating_mul(2);
                    }
                }
            }
        }
        self.inner.send_async(request).await.map_err(|err| {
            error!("http client retries exhausted: {}", err);
            err.into()
        })
    }
}
