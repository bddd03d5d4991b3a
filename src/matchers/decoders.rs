use std::io::Read;

use flate2::read::GzDecoder;

use crate::common::data::Error;

/// Decodes a request body declared with the given `Content-Encoding` so the
/// body matcher can compare plain text. Schemes are looked up by the label
/// carried in the header.
pub(crate) fn decompress(scheme: &str, data: &[u8]) -> Result<Vec<u8>, Error> {
    match scheme {
        "gzip" => {
            let mut decoded = Vec::new();
            GzDecoder::new(data)
                .read_to_end(&mut decoded)
                .map_err(|e| Error::Matcher(format!("cannot decode gzip body: {}", e)))?;
            Ok(decoded)
        }
        other => Err(Error::Matcher(format!(
            "unsupported compression scheme: {}",
            other
        ))),
    }
}
