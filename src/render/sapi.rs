//! Rendering through Microsoft's Speech API (SAPI).
//!
//! SAPI is a COM library. [`initialize`] must be called on every thread that creates or uses a
//! [`SapiEngine`], and [`finalize`] must be called the same number of times before the thread
//! exits. When rendering from a tokio runtime, see
//! [`BuilderExt::enable_sapi`](crate::tokio::BuilderExt::enable_sapi).

use std::ops::Deref;
use std::path::Path;
use std::ptr::null;

use tracing::debug;
use windows as Windows;
use xml::writer::XmlEvent;
use xml::{EmitterConfig, EventWriter};
use Windows::core::{IUnknown, GUID};
use Windows::Win32::Media::Audio::{WAVEFORMATEX, WAVE_FORMAT_PCM};
use Windows::Win32::Media::Speech::{
    ISpStream, ISpVoice, SpStream, SpVoice, SPFM_CREATE_ALWAYS, SPF_ASYNC, SPF_IS_XML,
    SPF_PARSE_SAPI,
};
use Windows::Win32::System::Com::{CoCreateInstance, CoInitialize, CoUninitialize, CLSCTX_ALL};
use Windows::Win32::System::WindowsProgramming::INFINITE;

use super::{RenderError, VoiceEngine};

#[allow(non_upper_case_globals)]
const SPDFID_WaveFormatEx: GUID = GUID::from_u128(0xc31adbae_527f_4ff5_a230_f62bb61ff70c);

// SAPI rates are logarithmic: +10 is three times the default speed, -10 a third of it.
const DEFAULT_WPM: f64 = 180.0;
const MAX_SAPI_RATE: i32 = 10;
const MAX_SAPI_VOLUME: u16 = 100;

const NATURAL_PITCH: i32 = 50;
const MAX_PITCH: i32 = 99;
const MAX_SAPI_PITCH: i32 = 10;

const SAMPLE_RATE: u32 = 22050;
const BITS_PER_SAMPLE: u16 = 16;
const CHANNELS: u16 = 1;

/// Initializes SAPI on the current thread.
pub fn initialize() -> Result<(), RenderError> {
    unsafe { CoInitialize(null()) }?;
    Ok(())
}

/// Deinitializes SAPI for the current thread. Must be called once for every call to
/// [`initialize`].
pub fn finalize() {
    unsafe { CoUninitialize() }
}

// COM interface pointers are reference counted and SAPI objects are free-threaded, so the raw
// interfaces may cross threads.
struct Intf<I>(I);

unsafe impl<I> Send for Intf<I> {}
unsafe impl<I> Sync for Intf<I> {}

impl<I> Deref for Intf<I> {
    type Target = I;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Speech driver backed by the system's default SAPI voice.
pub struct SapiEngine {
    intf: Intf<ISpVoice>,
    pitch: i32,
}

impl SapiEngine {
    /// Creates a driver for the default voice. SAPI must be initialized on the current thread.
    pub fn new() -> Result<Self, RenderError> {
        let intf: ISpVoice = unsafe { CoCreateInstance(&SpVoice, None, CLSCTX_ALL) }?;
        Ok(Self {
            intf: Intf(intf),
            pitch: NATURAL_PITCH,
        })
    }

    fn create_file(&self, path: &Path) -> Result<Intf<ISpStream>, RenderError> {
        let intf: ISpStream = unsafe { CoCreateInstance(&SpStream, None, CLSCTX_ALL) }?;
        unsafe {
            intf.BindToFile(
                path.as_os_str(),
                SPFM_CREATE_ALWAYS,
                &SPDFID_WaveFormatEx,
                &wave_format(),
                0,
            )
        }?;
        Ok(Intf(intf))
    }

    fn speak(&self, text: &str) -> Result<(), RenderError> {
        let speech = pitch_markup(text, to_sapi_pitch(self.pitch))?;
        unsafe { self.intf.Speak(speech.as_str(), (SPF_ASYNC.0 | SPF_IS_XML.0 | SPF_PARSE_SAPI.0) as _) }?;
        unsafe { self.intf.WaitUntilDone(INFINITE) }?;
        Ok(())
    }
}

impl VoiceEngine for SapiEngine {
    fn rate(&self) -> Result<i32, RenderError> {
        let mut rate = 0;
        unsafe { self.intf.GetRate(&mut rate) }?;
        Ok(from_sapi_rate(rate))
    }

    fn volume(&self) -> Result<f64, RenderError> {
        let mut volume = 0;
        unsafe { self.intf.GetVolume(&mut volume) }?;
        Ok(f64::from(volume) / f64::from(MAX_SAPI_VOLUME))
    }

    fn pitch(&self) -> Result<Option<i32>, RenderError> {
        Ok(Some(self.pitch))
    }

    fn set_rate(&mut self, rate: i32) -> Result<(), RenderError> {
        if rate <= 0 {
            return Err(RenderError::Unsupported(format!("a rate of {} words per minute", rate)));
        }
        unsafe { self.intf.SetRate(to_sapi_rate(rate)) }?;
        Ok(())
    }

    fn set_volume(&mut self, volume: f64) -> Result<(), RenderError> {
        let volume = (volume.clamp(0.0, 1.0) * f64::from(MAX_SAPI_VOLUME)).round() as u16;
        unsafe { self.intf.SetVolume(volume) }?;
        Ok(())
    }

    fn set_pitch(&mut self, pitch: i32) -> Result<(), RenderError> {
        if !(0..=MAX_PITCH).contains(&pitch) {
            return Err(RenderError::Unsupported(format!("pitch {} outside 0..={}", pitch, MAX_PITCH)));
        }
        self.pitch = pitch;
        Ok(())
    }

    fn save_to_file(&mut self, text: &str, destination: &Path) -> Result<(), RenderError> {
        debug!(destination = %destination.display(), "rendering speech with SAPI");
        let stream = self.create_file(destination)?;
        unsafe { self.intf.SetOutput(Some(stream.0.0.clone()), true) }?;

        let result = self.speak(text);

        // Releases the file before reporting the outcome.
        unsafe { self.intf.SetOutput(None::<IUnknown>, false) }?;
        drop(stream);
        result
    }
}

fn wave_format() -> WAVEFORMATEX {
    let block_align = u32::from(CHANNELS) * u32::from(BITS_PER_SAMPLE) / 8;
    WAVEFORMATEX {
        wFormatTag: WAVE_FORMAT_PCM as _,
        nChannels: CHANNELS,
        nSamplesPerSec: SAMPLE_RATE,
        nAvgBytesPerSec: SAMPLE_RATE * block_align,
        nBlockAlign: block_align as u16,
        wBitsPerSample: BITS_PER_SAMPLE,
        cbSize: 0,
    }
}

fn to_sapi_rate(wpm: i32) -> i32 {
    let rate = 10.0 * (f64::from(wpm) / DEFAULT_WPM).log(3.0);
    (rate.round() as i32).clamp(-MAX_SAPI_RATE, MAX_SAPI_RATE)
}

fn from_sapi_rate(rate: i32) -> i32 {
    (DEFAULT_WPM * 3f64.powf(f64::from(rate) / 10.0)).round() as i32
}

fn to_sapi_pitch(pitch: i32) -> i32 {
    ((pitch - NATURAL_PITCH) / 5).clamp(-MAX_SAPI_PITCH, MAX_SAPI_PITCH)
}

fn pitch_markup(text: &str, pitch: i32) -> Result<String, RenderError> {
    let mut writer = EventWriter::new_with_config(
        Vec::new(),
        EmitterConfig::new().keep_element_names_stack(false).write_document_declaration(false),
    );
    let pitch = pitch.to_string();
    [
        XmlEvent::start_element("pitch").attr("absmiddle", &pitch).into(),
        XmlEvent::characters(text),
        XmlEvent::end_element().name("pitch").into(),
    ]
    .into_iter()
    .try_for_each(|event| writer.write(event))
    .map_err(|err| RenderError::Failed(format!("failed to encode speech: {}", err)))?;

    String::from_utf8(writer.into_inner())
        .map_err(|err| RenderError::Failed(format!("failed to encode speech: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_mapping() {
        assert_eq!(0, to_sapi_rate(180));
        assert_eq!(10, to_sapi_rate(540));
        assert_eq!(10, to_sapi_rate(2000));
        assert_eq!(-10, to_sapi_rate(60));
        assert_eq!(180, from_sapi_rate(0));
        assert_eq!(540, from_sapi_rate(10));
    }

    #[test]
    fn test_pitch_mapping() {
        assert_eq!(0, to_sapi_pitch(50));
        assert_eq!(6, to_sapi_pitch(82));
        assert_eq!(-2, to_sapi_pitch(40));
        assert_eq!(-10, to_sapi_pitch(0));
    }

    #[test]
    fn test_pitch_markup() {
        let xml = pitch_markup("A & B", 4).unwrap();
        assert_eq!(r#"<pitch absmiddle="4">A &amp; B</pitch>"#, xml);
    }
}
