//! 인시던트 코덱 -- 큐 메시지 본문 ↔ [`Incident`]
//!
//! wire 형식은 JSON 객체이며 필드 이름은 [`Incident`]의 serde 정의를 따릅니다.
//! 디코딩은 엄격합니다. 필수 필드가 없거나 타입이 맞지 않으면
//! 기본값으로 채우지 않고 [`CodecError::MalformedIncident`]를 반환합니다.

use bytes::Bytes;

use crate::error::CodecError;
use crate::types::Incident;

/// 인시던트를 큐 메시지 본문으로 인코딩합니다.
pub fn encode(incident: &Incident) -> Result<Bytes, CodecError> {
    serde_json::to_vec(incident)
        .map(Bytes::from)
        .map_err(|e| CodecError::Serialization(e.to_string()))
}

/// 큐 메시지 본문을 인시던트로 디코딩합니다.
pub fn decode(body: &[u8]) -> Result<Incident, CodecError> {
    serde_json::from_slice(body).map_err(|e| CodecError::MalformedIncident(e.to_string()))
}
