use crate::context::Context;
use crate::fault::Fault;
use crate::message::{Request, Response, REQUEST_ID_HEADER};
use crate::pipeline::{Next, Policy};

/// Adds a random `x-request-id` unless the caller already set one.
/// Sits outside the retry policy, so every attempt of one send shares the id.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdPolicy;

/// Random RFC 4122 version-4 style identifier.
pub(crate) fn new_request_id() -> String {
    let mut bytes: [u8; 16] = rand::random();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    let h = hex::encode(bytes);
    format!("{}-{}-{}-{}-{}", &h[0..8], &h[8..12], &h[12..16], &h[16..20], &h[20..32])
}

impl Policy for RequestIdPolicy {
    fn process(&self, request: &mut Request, ctx: &Context, next: Next<'_>) -> Result<Response, Fault> {
        if request.header_str(REQUEST_ID_HEADER).is_none() {
            request.set_header(REQUEST_ID_HEADER, &new_request_id())?;
        }
        next.run(request, ctx)
    }

    fn name(&self) -> &'static str {
        "request-id"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{get, run_policy};

    #[test]
    fn id_has_v4_shape() {
        let id = new_request_id();
        assert_eq!(id.len(), 36);
        assert_eq!(&id[14..15], "4");
        assert!(matches!(&id[19..20], "8" | "9" | "a" | "b"));
        assert_ne!(id, new_request_id());
    }

    #[test]
    fn existing_id_kept() {
        let mut req = get("http://example.test/a");
        req.set_header(REQUEST_ID_HEADER, "fixed").unwrap();
        let seen = run_policy(&RequestIdPolicy, req);
        assert_eq!(seen.header_str(REQUEST_ID_HEADER), Some("fixed"));
    }

    #[test]
    fn missing_id_added() {
        let seen = run_policy(&RequestIdPolicy, get("http://example.test/a"));
        assert_eq!(seen.header_str(REQUEST_ID_HEADER).map(str::len), Some(36));
    }
}
