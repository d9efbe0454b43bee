use crate::imaging::store::ImageStore;

pub const BINS: usize = 256;

pub type ChannelBins = Vec<u32>;

#[derive(Debug, thiserror::Error)]
pub enum HistogramError {
    #[error("could not load image: {0}")]
    Unreadable(String),
    #[error("image {0} is empty")]
    Empty(String),
}

/// Per-channel intensity distributions for an image in the store,
/// returned as (blue, green, red). Recomputed on every call.
pub fn channel_histograms(
    store: &ImageStore,
    image_id: &str,
) -> Result<(ChannelBins, ChannelBins, ChannelBins), HistogramError> {
    let img = store
        .resolve(image_id)
        .map_err(|e| HistogramError::Unreadable(e.to_string()))?;
    let rgb = img.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(HistogramError::Empty(image_id.to_string()));
    }
    let hist = imageproc::stats::histogram(&rgb);
    let red = hist.channels[0].to_vec();
    let green = hist.channels[1].to_vec();
    let blue = hist.channels[2].to_vec();
    Ok((blue, green, red))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn store_with(name: &str, img: &RgbImage) -> (tempfile::TempDir, ImageStore) {
        let dir = tempfile::tempdir().unwrap();
        img.save(dir.path().join(name)).unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn counts_every_pixel_once_per_channel() {
        let mut img = RgbImage::new(3, 2);
        for px in img.pixels_mut() {
            *px = Rgb([10, 20, 30]);
        }
        let (_dir, store) = store_with("flat.png", &img);

        let (blue, green, red) = channel_histograms(&store, "flat.png").unwrap();
        for bins in [&blue, &green, &red] {
            assert_eq!(bins.len(), BINS);
            assert_eq!(bins.iter().sum::<u32>(), 6);
        }
        assert_eq!(blue[30], 6);
        assert_eq!(green[20], 6);
        assert_eq!(red[10], 6);
    }

    #[test]
    fn mixed_pixels_land_in_their_bins() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([0, 128, 255]));
        img.put_pixel(1, 0, Rgb([255, 128, 0]));
        let (_dir, store) = store_with("mix.png", &img);

        let (blue, green, red) = channel_histograms(&store, "mix.png").unwrap();
        assert_eq!(red[0], 1);
        assert_eq!(red[255], 1);
        assert_eq!(green[128], 2);
        assert_eq!(blue[255], 1);
        assert_eq!(blue[0], 1);
    }

    #[test]
    fn missing_image_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf());
        assert!(matches!(
            channel_histograms(&store, "nope.png"),
            Err(HistogramError::Unreadable(_))
        ));
    }
}
