use ffmpeg_next::{Rational, ffi};

use crate::{
    backend::{Encode, Mux},
    encoder::Encoder,
    error::{Result, TranscodeError},
    packet::RawPacket,
    stream::AvStream,
};

pub struct AvOutput {
    inner: ffmpeg_next::format::context::Output,
    url: String,
    have_written_header: bool,
    have_written_trailer: bool,
}

unsafe impl Send for AvOutput {}

impl AvOutput {
    /// Creates the output context; the container format is guessed from `url`.
    pub fn create(url: &str) -> Result<Self> {
        let output =
            ffmpeg_next::format::output(url).map_err(|source| TranscodeError::OpenFailure {
                path: url.to_string(),
                source,
            })?;
        Ok(Self {
            inner: output,
            url: url.to_string(),
            have_written_header: false,
            have_written_trailer: false,
        })
    }

    /// Adds a stream carrying the opened encoder's parameters.
    pub fn add_encoded_stream(&mut self, encoder: &Encoder) -> Result<usize> {
        let codec = ffmpeg_next::encoder::find(encoder.context().id());
        let mut writer_stream = self
            .inner
            .add_stream(codec)
            .map_err(TranscodeError::write("output stream"))?;
        let ret = unsafe {
            ffi::avcodec_parameters_from_context(
                (*writer_stream.as_mut_ptr()).codecpar,
                encoder.context().as_ptr(),
            )
        };
        if ret < 0 {
            return Err(TranscodeError::WriteFailure {
                what: "output stream parameters",
                source: ffmpeg_next::Error::from(ret),
            });
        }
        writer_stream.set_time_base(encoder.time_base());
        Ok(writer_stream.index())
    }

    /// Adds a stream whose parameters are copied verbatim from `stream`.
    pub fn add_copy_stream(&mut self, stream: &AvStream) -> Result<usize> {
        let mut writer_stream = self
            .inner
            .add_stream(ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::None))
            .map_err(TranscodeError::write("output stream"))?;
        writer_stream.set_parameters(stream.parameters().clone());
        // the input container's tag may be meaningless in the output container
        unsafe {
            (*(*writer_stream.as_mut_ptr()).codecpar).codec_tag = 0;
        }
        writer_stream.set_time_base(stream.time_base());
        Ok(writer_stream.index())
    }
}

impl Mux for AvOutput {
    type Packet = RawPacket;

    fn requires_global_header(&self) -> bool {
        unsafe {
            let format = (*self.inner.as_ptr()).oformat;
            !format.is_null() && (*format).flags & ffi::AVFMT_GLOBALHEADER as i32 != 0
        }
    }

    fn nb_streams(&self) -> usize {
        self.inner.nb_streams() as usize
    }

    fn write_header(&mut self) -> Result<()> {
        self.inner
            .write_header()
            .map_err(TranscodeError::write("header"))?;
        self.have_written_header = true;
        ffmpeg_next::format::context::output::dump(&self.inner, 0, Some(&self.url));
        Ok(())
    }

    fn stream_time_base(&self, index: usize) -> Rational {
        self.inner
            .stream(index)
            .map(|stream| stream.time_base())
            .unwrap_or(Rational::new(0, 1))
    }

    fn write_interleaved(&mut self, packet: &mut RawPacket) -> Result<()> {
        let p = packet.get_mut();
        p.set_position(-1);
        p.write_interleaved(&mut self.inner)
            .map_err(TranscodeError::write("packet"))
    }

    fn write_trailer(&mut self) -> Result<()> {
        if self.have_written_header && !self.have_written_trailer {
            self.have_written_trailer = true;
            self.inner
                .write_trailer()
                .map_err(TranscodeError::write("trailer"))?;
        }
        Ok(())
    }
}
