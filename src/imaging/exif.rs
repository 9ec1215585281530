use image::DynamicImage;
use std::io::{BufRead, Seek};

/// EXIFのOrientationタグを読む（無ければNone）
pub fn read_orientation<R: BufRead + Seek>(reader: &mut R) -> Option<u32> {
    let exif_reader = exif::Reader::new();
    let exif = exif_reader.read_from_container(reader).ok()?;

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
}

/// Orientationに従って画像を正立させる
pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}
