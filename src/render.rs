use crate::aggregator::CURSOR_MARKER;
use std::io::{self, Write};

// Backspace, blank, backspace: rubs out the single-width cursor marker.
const ERASE_MARKER: &str = "\u{8} \u{8}";

/// Turns cumulative reply snapshots into incremental terminal output.
///
/// Snapshots ending in the cursor marker are drawn with the marker; the
/// marker is erased before anything else is written.
pub struct StreamRenderer<W: Write> {
    out: W,
    shown: String,
    marker_visible: bool,
}

impl<W: Write> StreamRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            shown: String::new(),
            marker_visible: false,
        }
    }

    pub fn update(&mut self, snapshot: &str) -> io::Result<()> {
        let (text, with_marker) = match snapshot.strip_suffix(CURSOR_MARKER) {
            Some(text) => (text, true),
            None => (snapshot, false),
        };

        self.erase_marker()?;

        if let Some(new_text) = text.strip_prefix(self.shown.as_str()) {
            self.out.write_all(new_text.as_bytes())?;
            self.shown.push_str(new_text);
        } else {
            // Not an extension of what is on screen; start over on a new line.
            writeln!(self.out)?;
            self.out.write_all(text.as_bytes())?;
            self.shown = text.to_string();
        }

        if with_marker {
            self.out.write_all(CURSOR_MARKER.as_bytes())?;
            self.marker_visible = true;
        }
        self.out.flush()
    }

    /// End the reply: drop a leftover marker and move to a fresh line.
    pub fn finish(&mut self) -> io::Result<()> {
        self.erase_marker()?;
        if !self.shown.is_empty() {
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    pub fn shown(&self) -> &str {
        &self.shown
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn erase_marker(&mut self) -> io::Result<()> {
        if self.marker_visible {
            self.out.write_all(ERASE_MARKER.as_bytes())?;
            self.marker_visible = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(renderer: StreamRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn writes_only_new_text_and_moves_the_marker() {
        let mut renderer = StreamRenderer::new(Vec::new());
        renderer.update(&format!("Hel{}", CURSOR_MARKER)).unwrap();
        renderer.update(&format!("Hello{}", CURSOR_MARKER)).unwrap();
        renderer.update("Hello").unwrap();
        renderer.finish().unwrap();

        assert_eq!(renderer.shown(), "Hello");
        assert_eq!(
            output(renderer),
            format!(
                "Hel{m}{e}lo{m}{e}\n",
                m = CURSOR_MARKER,
                e = ERASE_MARKER
            )
        );
    }

    #[test]
    fn finish_erases_marker_left_by_a_failed_stream() {
        let mut renderer = StreamRenderer::new(Vec::new());
        renderer.update(&format!("partial{}", CURSOR_MARKER)).unwrap();
        renderer.finish().unwrap();

        assert_eq!(
            output(renderer),
            format!("partial{}{}\n", CURSOR_MARKER, ERASE_MARKER)
        );
    }

    #[test]
    fn diverging_snapshot_is_redrawn() {
        let mut renderer = StreamRenderer::new(Vec::new());
        renderer.update("abc").unwrap();
        renderer.update("xyz").unwrap();
        assert_eq!(renderer.shown(), "xyz");
        assert_eq!(output(renderer), "abc\nxyz");
    }

    #[test]
    fn finishing_without_output_writes_nothing() {
        let mut renderer = StreamRenderer::new(Vec::new());
        renderer.finish().unwrap();
        assert_eq!(output(renderer), "");
    }
}
