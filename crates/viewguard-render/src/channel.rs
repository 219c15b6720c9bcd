//! Output channels a view can be rendered onto.
//!
//! The recursion guard does not care where output goes. Each channel adapter
//! turns rendered view text, or the recursion error that replaces it, into
//! writes on one kind of output:
//!
//! | Channel | Output |
//! |---------|--------|
//! | [`ResponseChannel`] | Byte stream, such as an HTTP response body |
//! | [`TextChannel`] | Character stream (`String`, `fmt::Formatter`, ...) |
//! | [`MarkupChannel`] | Structured markup events through `quick_xml` |

use std::fmt;
use std::io;

use quick_xml::events::{BytesText, Event};
use quick_xml::Writer;
use viewguard::RecursionDetected;

use crate::error::RenderError;

/// Destination for one view's output.
pub trait Channel {
    /// Writes the rendered view.
    fn write_content(&mut self, content: &str) -> Result<(), RenderError>;

    /// Writes the representation of a recursion in place of the view.
    ///
    /// `text` is the rendered error (message or error template output).
    fn write_recursion_error(
        &mut self,
        detected: &RecursionDetected,
        text: &str,
    ) -> Result<(), RenderError>;
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn write_content(&mut self, content: &str) -> Result<(), RenderError> {
        (**self).write_content(content)
    }

    fn write_recursion_error(
        &mut self,
        detected: &RecursionDetected,
        text: &str,
    ) -> Result<(), RenderError> {
        (**self).write_recursion_error(detected, text)
    }
}

/// Writes views as UTF-8 bytes to an [`io::Write`].
#[derive(Debug)]
pub struct ResponseChannel<W> {
    out: W,
}

impl<W: io::Write> ResponseChannel<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: io::Write> Channel for ResponseChannel<W> {
    fn write_content(&mut self, content: &str) -> Result<(), RenderError> {
        self.out.write_all(content.as_bytes())?;
        Ok(())
    }

    fn write_recursion_error(
        &mut self,
        _detected: &RecursionDetected,
        text: &str,
    ) -> Result<(), RenderError> {
        self.out.write_all(text.as_bytes())?;
        Ok(())
    }
}

/// Writes views to a [`fmt::Write`].
///
/// ```rust
/// use viewguard_render::{Channel, TextChannel};
///
/// let mut out = String::new();
/// TextChannel::new(&mut out).write_content("hello").unwrap();
/// assert_eq!(out, "hello");
/// ```
#[derive(Debug)]
pub struct TextChannel<W> {
    out: W,
}

impl<W: fmt::Write> TextChannel<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: fmt::Write> Channel for TextChannel<W> {
    fn write_content(&mut self, content: &str) -> Result<(), RenderError> {
        self.out.write_str(content)?;
        Ok(())
    }

    fn write_recursion_error(
        &mut self,
        _detected: &RecursionDetected,
        text: &str,
    ) -> Result<(), RenderError> {
        self.out.write_str(text)?;
        Ok(())
    }
}

/// Element emitted in place of a recursive view on a [`MarkupChannel`].
pub const RECURSION_ELEMENT: &str = "recursion-error";

/// Emits views as markup events.
///
/// View output becomes a text event. A recursion becomes a
/// `<recursion-error bean=".." view="..">` element holding the error text.
pub struct MarkupChannel<W: io::Write> {
    writer: Writer<W>,
}

impl<W: io::Write> MarkupChannel<W> {
    pub fn new(out: W) -> Self {
        Self {
            writer: Writer::new(out),
        }
    }

    /// Uses an existing writer, e.g. one already inside an open element.
    pub fn from_writer(writer: Writer<W>) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: io::Write> Channel for MarkupChannel<W> {
    fn write_content(&mut self, content: &str) -> Result<(), RenderError> {
        self.writer.write_event(Event::Text(BytesText::new(content)))?;
        Ok(())
    }

    fn write_recursion_error(
        &mut self,
        detected: &RecursionDetected,
        text: &str,
    ) -> Result<(), RenderError> {
        self.writer
            .create_element(RECURSION_ELEMENT)
            .with_attribute(("bean", detected.bean()))
            .with_attribute(("view", detected.view()))
            .write_text_content(BytesText::new(text))?;
        Ok(())
    }
}

impl<W: io::Write> fmt::Debug for MarkupChannel<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkupChannel").finish_non_exhaustive()
    }
}
