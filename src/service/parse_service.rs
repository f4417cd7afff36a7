use crate::module::blob::error::AppError;
use crate::module::blob::model::BlobRequest;
use crate::module::blob::schema::BlobBody;
use crate::service::hash_service::sha256_pair_hex;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const NAMESPACE_WIDTH: usize = 29;
const V0_ID_WIDTH: usize = 10;

/// Validate and canonicalize an inbound body into a fingerprinted unit
/// of work. Pure; never partially succeeds.
pub fn parse_blob_request(
    body: &BlobBody,
    default_namespace_b64: &str,
    max_blob_bytes: usize,
) -> Result<BlobRequest, AppError> {
    let data = decode_canonical(&body.data, "INVALID_DATA_B64", "data")?;
    if data.is_empty() {
        return Err(AppError::bad_request(
            "EMPTY_PAYLOAD",
            "decoded data must not be empty",
        ));
    }
    if data.len() > max_blob_bytes {
        return Err(AppError::payload_too_large(
            "BLOB_TOO_LARGE",
            format!(
                "decoded payload is {} bytes, limit is {max_blob_bytes}",
                data.len()
            ),
        ));
    }

    let namespace_b64 = body
        .namespace_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_namespace_b64);
    let namespace = decode_namespace(namespace_b64)?;

    let payload_bytes = data.len();
    let fingerprint = sha256_pair_hex(&namespace, &data);
    Ok(BlobRequest {
        namespace,
        data,
        payload_bytes,
        fingerprint,
    })
}

/// Strict round-trip rule: the decoded bytes must re-encode to the
/// exact input string, rejecting non-canonical padding or trailing
/// bits that would alias distinct encodings to the same payload.
pub fn decode_canonical(
    input: &str,
    code: &'static str,
    field: &str,
) -> Result<Vec<u8>, AppError> {
    let decoded = STANDARD
        .decode(input)
        .map_err(|e| AppError::bad_request(code, format!("{field} is not valid base64: {e}")))?;
    if STANDARD.encode(&decoded) != input {
        return Err(AppError::bad_request(
            code,
            format!("{field} is not canonical base64"),
        ));
    }
    Ok(decoded)
}

/// Decode and widen a base64 namespace. Also run once at config load
/// so a bad default namespace fails startup instead of every request.
pub fn decode_namespace(namespace_b64: &str) -> Result<Vec<u8>, AppError> {
    let raw = decode_canonical(namespace_b64, "INVALID_NAMESPACE_B64", "namespace_id")?;
    normalize_namespace(raw)
}

/// Accepts the three namespace forms the poster tooling understands:
/// full 29-byte versioned namespaces, 28-byte unversioned ones (a zero
/// version byte is prepended), and plain 10-byte v0 sub-namespace ids
/// (expanded to version 0 with 18 leading zero bytes).
fn normalize_namespace(bytes: Vec<u8>) -> Result<Vec<u8>, AppError> {
    match bytes.len() {
        n if n == NAMESPACE_WIDTH => Ok(bytes),
        n if n == NAMESPACE_WIDTH - 1 => {
            let mut versioned = Vec::with_capacity(NAMESPACE_WIDTH);
            versioned.push(0);
            versioned.extend_from_slice(&bytes);
            Ok(versioned)
        }
        n if n == V0_ID_WIDTH => {
            let mut versioned = vec![0u8; NAMESPACE_WIDTH - V0_ID_WIDTH];
            versioned.extend_from_slice(&bytes);
            Ok(versioned)
        }
        n => Err(AppError::bad_request(
            "INVALID_NAMESPACE_B64",
            format!("namespace must decode to 10, 28 or 29 bytes, got {n}"),
        )),
    }
}
