use image::{DynamicImage, RgbaImage};
use image_hasher::{HashAlg, HasherConfig, ImageHash};

/// Hamming distance at or below which two captures count as the same scene.
pub const NEAR_DUPLICATE_THRESHOLD: u32 = 8;

/// Perceptual hash of a frame, base64 encoded.
pub fn frame_fingerprint(frame: &RgbaImage) -> String {
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::DoubleGradient)
        .hash_size(8, 8)
        .to_hasher();

    let hash = hasher.hash_image(&DynamicImage::ImageRgba8(frame.clone()));
    hash.to_base64()
}

/// Distance between two fingerprints; `u32::MAX` if either does not decode.
pub fn fingerprint_distance(lhs: &str, rhs: &str) -> u32 {
    let Ok(h1) = ImageHash::<Vec<u8>>::from_base64(lhs) else {
        return u32::MAX;
    };
    let Ok(h2) = ImageHash::<Vec<u8>>::from_base64(rhs) else {
        return u32::MAX;
    };
    h1.dist(&h2)
}
