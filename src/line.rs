use crate::{
    chip::Chip,
    errors::{Error, Result},
    gateway::{Gateway, Kernel},
    request::Request,
};

pub mod encoder;
pub mod event;
mod info;
pub mod options;
pub mod set;
pub mod values;

pub use event::{EdgeEvent, InfoChangeEvent};
pub use info::LineInfo;
pub use set::LineSet;
pub use values::{LineValue, LineValues};

/// A single line of a chip, optionally seen through the request holding it.
#[derive(Debug, Clone)]
pub struct Line<'a, G: Gateway = Kernel> {
    chip: &'a Chip<G>,
    offset: u32,
    request: Option<&'a Request<'a, G>>,
}

impl<'a, G: Gateway> Line<'a, G> {
    pub(crate) fn new(
        chip: &'a Chip<G>,
        offset: u32,
        request: Option<&'a Request<'a, G>>,
    ) -> Self {
        Self {
            chip,
            offset,
            request,
        }
    }

    pub fn chip(&self) -> &'a Chip<G> {
        self.chip
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn name(&self) -> Option<&'a str> {
        self.chip.line_name(self.offset)
    }

    /// The current info from the kernel.
    pub fn info(&self) -> Result<LineInfo> {
        self.chip.line_info(self.offset)
    }

    /// True if the line is viewed through an active request.
    pub fn is_requested(&self) -> bool {
        self.request.is_some_and(Request::is_active)
    }

    fn request(&self) -> Result<&'a Request<'a, G>> {
        self.request.ok_or(Error::NotRequested(self.offset))
    }

    pub fn value(&self) -> Result<bool> {
        self.request()?.value(self.offset)
    }

    pub fn set_value(&self, value: bool) -> Result<()> {
        self.request()?.set_value(self.offset, value)
    }
}
