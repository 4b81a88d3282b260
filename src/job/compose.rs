//! Receiver-side composition: a [`PrintJob`] becomes one paper-width bitmap.

use image::GrayImage;
use tracing::{debug, warn};

use super::{FragmentContent, PrintJob};
use crate::config::RenderConfig;
use crate::render::compositor;

/// Render every fragment of `job` and stack them at the paper width.
///
/// Text fragments use the body font. Images that fail to decode are logged
/// and left out; the rest of the job still prints. Returns `None` when
/// nothing printable remains.
pub fn compose(job: &PrintJob, config: &RenderConfig) -> Option<GrayImage> {
    let paper_width = config.paper_width();
    let mut bitmaps = Vec::new();

    for fragment in job.fragments() {
        match fragment.content {
            FragmentContent::Text(text) => {
                bitmaps.push(compositor::text_to_bitmap(&text, &config.body_font, paper_width));
            }
            FragmentContent::Image(bytes) => match compositor::image_from_bytes(&bytes) {
                Ok(img) => {
                    let img = if config.auto_rotate {
                        compositor::auto_rotate(img, paper_width)
                    } else {
                        img
                    };
                    bitmaps.push(img);
                }
                Err(e) => {
                    warn!(section = ?fragment.section, size = bytes.len(), error = %e, "skipping undecodable image");
                }
            },
        }
    }

    debug!(parts = bitmaps.len(), "composing job");
    compositor::stack_vertically(&bitmaps, paper_width, config.padding)
}
