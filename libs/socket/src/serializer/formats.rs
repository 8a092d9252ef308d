//! Byte encodings applied to a model inside one frame

use crate::model::{Model, NativeModel};
use crate::Result;
use bytes::{BufMut, BytesMut};

/// Encoding of model `M` to and from a frame payload
pub trait WireFormat<M>: Send + Sync + 'static {
    /// Append the encoded model to `dst`
    fn marshal(&self, model: &M, dst: &mut BytesMut) -> Result<()>;

    /// Replace the contents of `model` with the decoded payload
    fn unmarshal(&self, src: &[u8], model: &mut M) -> Result<()>;
}

/// The model writes and reads its own bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct Native;

impl<M: NativeModel> WireFormat<M> for Native {
    fn marshal(&self, model: &M, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(model.marshal());
        Ok(())
    }

    fn unmarshal(&self, src: &[u8], model: &mut M) -> Result<()> {
        model.unmarshal(src)
    }
}

/// Compact binary encoding through serde
#[derive(Debug, Clone, Copy, Default)]
pub struct Bincode;

impl<M: Model> WireFormat<M> for Bincode {
    fn marshal(&self, model: &M, dst: &mut BytesMut) -> Result<()> {
        bincode::serialize_into(dst.writer(), model)?;
        Ok(())
    }

    fn unmarshal(&self, src: &[u8], model: &mut M) -> Result<()> {
        *model = bincode::deserialize(src)?;
        Ok(())
    }
}

/// Self-describing JSON through serde
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl<M: Model> WireFormat<M> for Json {
    fn marshal(&self, model: &M, dst: &mut BytesMut) -> Result<()> {
        serde_json::to_writer(dst.writer(), model)?;
        Ok(())
    }

    fn unmarshal(&self, src: &[u8], model: &mut M) -> Result<()> {
        *model = serde_json::from_slice(src)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::raw::RawRequest;
    use crate::model::structured::{HeaderField, StructuredResponse};
    use crate::TransportError;

    fn sample() -> StructuredResponse {
        StructuredResponse {
            status: 200,
            reason: "OK".to_string(),
            proto: "HTTP/1.1".to_string(),
            headers: vec![HeaderField {
                name: "Server".to_string(),
                value: "test".to_string(),
            }],
            body: b"hello".to_vec(),
        }
    }

    #[test]
    fn test_json_and_bincode_carry_the_model() {
        let formats: [&dyn WireFormat<StructuredResponse>; 2] = [&Json, &Bincode];
        for format in formats {
            let mut buf = BytesMut::new();
            format.marshal(&sample(), &mut buf).unwrap();

            let mut decoded = StructuredResponse::default();
            format.unmarshal(&buf, &mut decoded).unwrap();
            assert_eq!(decoded, sample());
        }
    }

    #[test]
    fn test_native_appends_model_bytes() {
        let model = RawRequest {
            data: b"GET / HTTP/1.1\r\n\r\n".to_vec(),
        };
        let mut buf = BytesMut::from(&b"prefix"[..]);
        Native.marshal(&model, &mut buf).unwrap();
        assert_eq!(&buf[..], b"prefixGET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn test_corrupt_json_is_protocol_error() {
        let mut model = StructuredResponse::default();
        let err = WireFormat::unmarshal(&Json, b"{\"status\":", &mut model).unwrap_err();
        assert!(matches!(err, TransportError::Protocol { .. }));
    }
}
