use image::RgbImage;
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Image payload is empty")]
    Empty,
    #[error("Error decoding image: {0}")]
    Decode(String),
}

pub fn decode_image(image_data: &[u8]) -> Result<RgbImage, DecodeError> {
    if image_data.is_empty() {
        return Err(DecodeError::Empty);
    }

    let image_reader = image::ImageReader::new(Cursor::new(image_data))
        .with_guessed_format()
        .map_err(|e| DecodeError::Decode(e.to_string()))?;

    let decoded = image_reader
        .decode()
        .map_err(|e| DecodeError::Decode(e.to_string()))?;

    Ok(decoded.to_rgb8())
}
