//! Raw data model: the exchange's HTTP/1.1 bytes as an opaque blob

use super::{ClientCodec, ModelPools, NativeModel, ServerCodec, Transmittable};
use crate::Result;
use exchange::Exchange;
use serde::{Deserialize, Serialize};

/// Serialized HTTP/1.1 request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRequest {
    pub data: Vec<u8>,
}

/// Serialized HTTP/1.1 response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    pub data: Vec<u8>,
}

macro_rules! raw_model {
    ($model:ty) => {
        impl Transmittable for $model {
            fn reset(&mut self) {
                self.data.clear();
            }
        }

        impl NativeModel for $model {
            fn marshal(&self) -> &[u8] {
                &self.data
            }

            fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
                self.data.clear();
                self.data.extend_from_slice(data);
                Ok(())
            }
        }
    };
}

raw_model!(RawRequest);
raw_model!(RawResponse);

pub type RawPools = ModelPools<RawRequest, RawResponse>;

/// Client codec writing the request's wire form straight into the model
#[derive(Default)]
pub struct RawClientCodec {
    pools: RawPools,
}

impl RawClientCodec {
    pub fn new(pools: RawPools) -> Self {
        Self { pools }
    }
}

impl ClientCodec for RawClientCodec {
    type Request = RawRequest;
    type Response = RawResponse;

    fn pools(&self) -> &RawPools {
        &self.pools
    }

    fn encode(&mut self, request: &mut RawRequest, exchange: &Exchange) -> Result<()> {
        request.data.clear();
        exchange.request.write_to(&mut request.data);
        Ok(())
    }

    fn decode(&mut self, exchange: &mut Exchange, response: &RawResponse) -> Result<()> {
        exchange.response.read_from(&response.data)?;
        Ok(())
    }
}

/// Server codec, the mirror of [`RawClientCodec`]
#[derive(Default)]
pub struct RawServerCodec {
    pools: RawPools,
}

impl RawServerCodec {
    pub fn new(pools: RawPools) -> Self {
        Self { pools }
    }
}

impl ServerCodec for RawServerCodec {
    type Request = RawRequest;
    type Response = RawResponse;

    fn pools(&self) -> &RawPools {
        &self.pools
    }

    fn decode(&mut self, exchange: &mut Exchange, request: &RawRequest) -> Result<()> {
        exchange.request.read_from(&request.data)?;
        Ok(())
    }

    fn encode(&mut self, response: &mut RawResponse, exchange: &Exchange) -> Result<()> {
        response.data.clear();
        exchange.response.write_to(&mut response.data);
        Ok(())
    }
}
