//! Client-held cache of an upstream calendar.
//!
//! The envelope is the serialized calendar, gzipped with the source URL in
//! the gzip header's FNAME field, then base64 encoded. The server keeps no
//! copy; the client posts the string back on its next request.

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};

use crate::error::{CacheError, ParseError};
use crate::ics::{CalendarDocument, parse_calendar, serialize_calendar};

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEnvelope {
    pub url: String,
    pub calendar: CalendarDocument,
}

impl CacheEnvelope {
    pub fn new(url: impl Into<String>, calendar: CalendarDocument) -> Self {
        CacheEnvelope {
            url: url.into(),
            calendar,
        }
    }

    pub fn encode(&self) -> Result<String, CacheError> {
        // FNAME is NUL terminated
        if self.url.contains('\0') {
            return Err(CacheError::Encode("url contains a NUL byte".to_string()));
        }

        let mut encoder = GzBuilder::new()
            .filename(self.url.as_bytes())
            .write(Vec::new(), Compression::best());
        encoder
            .write_all(serialize_calendar(&self.calendar).as_bytes())
            .map_err(|e| CacheError::Encode(e.to_string()))?;
        let compressed = encoder
            .finish()
            .map_err(|e| CacheError::Encode(e.to_string()))?;

        Ok(STANDARD.encode(compressed))
    }

    pub fn decode(cache: &str) -> Result<CacheEnvelope, CacheError> {
        let compressed = STANDARD.decode(cache.trim())?;

        let mut decoder = GzDecoder::new(compressed.as_slice());
        let url = {
            let header = decoder
                .header()
                .ok_or_else(|| CacheError::Header("invalid gzip header".to_string()))?;
            let filename = header
                .filename()
                .ok_or_else(|| CacheError::Header("no url in gzip header".to_string()))?;
            std::str::from_utf8(filename)
                .map_err(|e| CacheError::Header(format!("url is not UTF-8: {e}")))?
                .to_string()
        };

        let mut body = Vec::new();
        decoder.read_to_end(&mut body).map_err(CacheError::Body)?;
        let body = String::from_utf8(body).map_err(ParseError::from)?;

        let calendar = parse_calendar(&body)?;
        Ok(CacheEnvelope { url, calendar })
    }
}
