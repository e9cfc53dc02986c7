use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::convert::Infallible;
use tracing::debug;

/// JSON body extractor that never rejects.
///
/// A body that is not a JSON object becomes `{}`, and object fields whose
/// values are not strings are dropped before deserializing into `T`.
#[derive(Debug, Clone, Default)]
pub struct LenientJson<T>(pub T);

pub(crate) fn lenient_from_slice<T>(bytes: &[u8]) -> T
where
    T: DeserializeOwned + Default,
{
    let mut object = match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(object)) => object,
        Ok(_) => {
            debug!("request body is not a JSON object; treating as empty");
            return T::default();
        }
        Err(err) => {
            debug!(error = %err, "malformed request body; treating as empty");
            return T::default();
        }
    };
    object.retain(|_, value| value.is_string());
    serde_json::from_value(Value::Object(object)).unwrap_or_default()
}

#[async_trait]
impl<S, T> FromRequest<S> for LenientJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = match Bytes::from_request(req, state).await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(error = %err, "failed to read request body");
                Bytes::new()
            }
        };
        Ok(Self(lenient_from_slice(&bytes)))
    }
}
