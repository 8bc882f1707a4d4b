use std::io::Write;
use std::path::Path;

use weave_core::{Result, WeaveError};
use weave_wire::Response;

/// Writes a response's pixel data out as a binary PPM (P6): the simplest
/// format that can hold raw RGB bytes without pulling in an image codec for
/// output nobody will run a diffusion model to produce.
pub fn write_ppm(response: &Response, path: &Path) -> Result<()> {
    if response.channels != 3 {
        return Err(WeaveError::Internal(format!(
            "PPM output requires 3 channels, got {}",
            response.channels
        )));
    }
    let expected = response.image_width as usize * response.image_height as usize * 3;
    if response.image_data.len() != expected {
        return Err(WeaveError::Internal(format!(
            "image data length {} does not match {}x{}x3",
            response.image_data.len(),
            response.image_width,
            response.image_height
        )));
    }

    let mut file = std::fs::File::create(path)?;
    write!(file, "P6\n{} {}\n255\n", response.image_width, response.image_height)?;
    file.write_all(&response.image_data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response(width: u32, height: u32) -> Response {
        Response {
            request_id: 1,
            status: 200,
            generation_time_ms: 0,
            image_width: width,
            image_height: height,
            channels: 3,
            image_data: vec![0u8; width as usize * height as usize * 3],
        }
    }

    #[test]
    fn writes_a_valid_ppm_header_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ppm");
        write_ppm(&sample_response(4, 2), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"P6\n4 2\n255\n"));
        assert_eq!(bytes.len(), "P6\n4 2\n255\n".len() + 4 * 2 * 3);
    }

    #[test]
    fn rejects_mismatched_data_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ppm");
        let mut response = sample_response(4, 2);
        response.image_data.pop();
        assert!(write_ppm(&response, &path).is_err());
    }
}
