//! `ApiVersions`: the first request every connection sends, used to learn
//! which version of each subsequent API the broker supports.

use std::io::{Read, Write};

use crate::protocol::{
    api_key::ApiKey,
    api_version::{ApiVersion, ApiVersionRange},
    error::Error as ApiError,
    messages::{read_compact_versioned_array, write_compact_versioned_array, write_versioned_array},
    primitives::TaggedFields,
    traits::{ReadCompactType, ReadType, WriteCompactType, WriteType},
};

use super::{
    read_versioned_array, ReadVersionedError, ReadVersionedType, RequestBody, WriteVersionedError,
    WriteVersionedType,
};

#[cfg(test)]
use proptest::prelude::*;

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ApiVersionsRequest {
    /// Added in version 3.
    pub client_software_name: Option<String>,
    /// Added in version 3.
    pub client_software_version: Option<String>,
    /// Added in version 3.
    pub tagged_fields: Option<TaggedFields>,
}

impl<R: Read> ReadVersionedType<R> for ApiVersionsRequest {
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 3);

        if version.0 < 3 {
            return Ok(Self {
                client_software_name: None,
                client_software_version: None,
                tagged_fields: None,
            });
        }

        Ok(Self {
            client_software_name: Some(String::read_compact(reader)?),
            client_software_version: Some(String::read_compact(reader)?),
            tagged_fields: Some(TaggedFields::read(reader)?),
        })
    }
}

impl<W: Write> WriteVersionedType<W> for ApiVersionsRequest {
    fn write_versioned(&self, writer: &mut W, version: ApiVersion) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 3);

        if version.0 < 3 {
            return Ok(());
        }

        match &self.client_software_name {
            Some(name) => name.write_compact(writer)?,
            None => String::new().write_compact(writer)?,
        }
        match &self.client_software_version {
            Some(version) => version.write_compact(writer)?,
            None => String::new().write_compact(writer)?,
        }
        Ok(self.tagged_fields.write(writer)?)
    }
}

impl RequestBody for ApiVersionsRequest {
    type ResponseBody = ApiVersionsResponse;
    const API_KEY: ApiKey = ApiKey::ApiVersions;
    const API_VERSION_RANGE: ApiVersionRange = ApiVersionRange::new(0, 3);
    const FIRST_TAGGED_FIELD_IN_REQUEST_VERSION: ApiVersion = ApiVersion(3);

    // Real brokers don't actually tag-field their ApiVersions v3 response --
    // rdkafka works around the same broker quirk, see
    // https://github.com/edenhill/librdkafka/blob/2b76b65212e5efda213961d5f84e565038036270/src/rdkafka_broker.c#L1781-L1785
    const FIRST_TAGGED_FIELD_IN_RESPONSE_VERSION: ApiVersion = ApiVersion(i16::MAX);
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ApiVersionsResponseApiKey {
    pub api_key: ApiKey,
    pub min_version: ApiVersion,
    pub max_version: ApiVersion,
    /// Added in version 3.
    pub tagged_fields: Option<TaggedFields>,
}

impl<R: Read> ReadVersionedType<R> for ApiVersionsResponseApiKey {
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 3);

        let api_key = i16::read(reader)?.into();
        let min_version = ApiVersion(i16::read(reader)?);
        let max_version = ApiVersion(i16::read(reader)?);
        let tagged_fields = if version.0 >= 3 {
            Some(TaggedFields::read(reader)?)
        } else {
            None
        };

        Ok(Self {
            api_key,
            min_version,
            max_version,
            tagged_fields,
        })
    }
}

// Encoding is only exercised by this module's own round-trip tests.
impl<W: Write> WriteVersionedType<W> for ApiVersionsResponseApiKey {
    fn write_versioned(&self, writer: &mut W, version: ApiVersion) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 3);

        i16::from(self.api_key).write(writer)?;
        self.min_version.0.write(writer)?;
        self.max_version.0.write(writer)?;

        if version.0 >= 3 {
            self.tagged_fields.write(writer)?;
        }

        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct ApiVersionsResponse {
    #[cfg_attr(test, proptest(strategy = "any::<i16>().prop_map(ApiError::new)"))]
    pub error_code: Option<ApiError>,

    #[cfg_attr(test, proptest(strategy = "prop::collection::vec(any::<ApiVersionsResponseApiKey>(), 0..2)"))]
    pub api_keys: Vec<ApiVersionsResponseApiKey>,

    /// Added in version 1. `None` defaults to "no throttle" on the wire.
    pub throttle_time_ms: Option<i32>,

    /// Added in version 3.
    pub tagged_fields: Option<TaggedFields>,
}

impl<R: Read> ReadVersionedType<R> for ApiVersionsResponse {
    fn read_versioned(reader: &mut R, version: ApiVersion) -> Result<Self, ReadVersionedError> {
        assert!(version.0 <= 3);

        let error_code = ApiError::new(i16::read(reader)?);
        let api_keys = if version.0 >= 3 {
            read_compact_versioned_array(reader, version)?.unwrap_or_default()
        } else {
            read_versioned_array(reader, version)?.unwrap_or_default()
        };
        let throttle_time_ms = match version.0 {
            v if v >= 1 => Some(i32::read(reader)?),
            _ => None,
        };
        let tagged_fields = match version.0 {
            3 => Some(TaggedFields::read(reader)?),
            _ => None,
        };

        Ok(Self {
            error_code,
            api_keys,
            throttle_time_ms,
            tagged_fields,
        })
    }
}

impl<W: Write> WriteVersionedType<W> for ApiVersionsResponse {
    fn write_versioned(&self, writer: &mut W, version: ApiVersion) -> Result<(), WriteVersionedError> {
        assert!(version.0 <= 3);

        self.error_code.map_or(0, |e| e.code()).write(writer)?;

        if version.0 >= 3 {
            write_compact_versioned_array(writer, version, Some(&self.api_keys))?;
        } else {
            write_versioned_array(writer, version, Some(&self.api_keys))?;
        }

        if version.0 >= 1 {
            self.throttle_time_ms.unwrap_or(0).write(writer)?;
        }

        if version.0 >= 3 {
            self.tagged_fields.write(writer)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::protocol::messages::test_utils::test_roundtrip_versioned;
    use crate::protocol::primitives::UnsignedVarint;

    test_roundtrip_versioned!(
        ApiVersionsRequest,
        ApiVersionsRequest::API_VERSION_RANGE.min(),
        ApiVersionsRequest::API_VERSION_RANGE.max(),
        test_roundtrip_api_versions_request
    );

    test_roundtrip_versioned!(
        ApiVersionsResponse,
        ApiVersionsRequest::API_VERSION_RANGE.min(),
        ApiVersionsRequest::API_VERSION_RANGE.max(),
        test_roundtrip_api_versions_response
    );

    #[test]
    fn request() {
        for (name, version, req, want) in [
            (
                "basic",
                0,
                ApiVersionsRequest {
                    client_software_name: None,
                    client_software_version: None,
                    tagged_fields: None,
                },
                [].as_ref(),
            ),
            (
                "basic",
                3,
                ApiVersionsRequest {
                    client_software_name: Some("sarama".to_string()),
                    client_software_version: Some("0.10.0".to_string()),
                    tagged_fields: None,
                },
                [
                    0x07, b's', b'a', b'r', b'a', b'm', b'a', // client software name
                    0x07, b'0', b'.', b'1', b'0', b'.', b'0', // client software version
                    0x00, // tagged fields
                ]
                .as_ref(),
            ),
        ] {
            let mut cursor = Cursor::new([0u8; 128]);
            req.write_versioned(&mut cursor, ApiVersion(version)).unwrap();
            let len = cursor.position() as usize;
            let got = &cursor.get_ref()[..len];
            assert_eq!(got, want, "{name}/{version}");
        }
    }

    #[test]
    fn response() {
        for (name, version, want, data) in [
            (
                "no error",
                0,
                ApiVersionsResponse {
                    error_code: None,
                    api_keys: vec![ApiVersionsResponseApiKey {
                        api_key: ApiKey::Metadata,
                        min_version: ApiVersion(0x02),
                        max_version: ApiVersion(0x01),
                        tagged_fields: None,
                    }],
                    throttle_time_ms: None,
                    tagged_fields: None,
                },
                [
                    0x00, 0x00, // error code
                    0x00, 0x00, 0x00, 0x01, // api keys length
                    0x00, 0x03, // api key Metadata
                    0x00, 0x02, // min version
                    0x00, 0x01, // max version
                ]
                .as_ref(),
            ),
            (
                "no error",
                3,
                ApiVersionsResponse {
                    error_code: None,
                    api_keys: vec![ApiVersionsResponseApiKey {
                        api_key: ApiKey::Metadata,
                        min_version: ApiVersion(0x02),
                        max_version: ApiVersion(0x01),
                        tagged_fields: Some(TaggedFields::default()),
                    }],
                    throttle_time_ms: Some(0),
                    tagged_fields: Some(TaggedFields(vec![(UnsignedVarint(1), vec![0, 0, 0, 0, 0, 0, 0, 0])])),
                },
                [
                    0x00, 0x00, // no error
                    0x02, // compact array length 1
                    0x00, 0x03, 0x00, 0x02, 0x00, 0x01, 0x00, // tagged fields
                    0x00, 0x00, 0x00, 0x00, // throttle time
                    0x01, 0x01, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // tagged fields (empty SupportedFeatures)
                ]
                .as_ref(),
            ),
        ] {
            let mut reader = Cursor::new(data);
            let got = ApiVersionsResponse::read_versioned(&mut reader, ApiVersion(version)).unwrap();
            assert_eq!(want, got, "{name}/{version}");
        }
    }
}
