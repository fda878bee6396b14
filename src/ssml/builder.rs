use std::io;
use std::time::Duration;

use xml::writer::{Error as EmitterError, XmlEvent};
use xml::{EmitterConfig, EventWriter};

use super::{BreakStrength, EmphasisLevel, RatePercent, SemitoneStep, VolumeLevel};

/// Helper type that writes an SSML document from a sequence of rendering instructions.
///
/// NOTE: The builder performs no structural validation. Every `start_*` call must be balanced by
/// the corresponding `end_*` call before [`build`](SsmlBuilder::build) is called. The first write
/// failure is kept and reported by `build`; later instructions are ignored.
pub struct SsmlBuilder {
    writer: EventWriter<Vec<u8>>,
    error: Option<EmitterError>,
}

impl SsmlBuilder {
    /// Starts a `speak` document in the given namespace.
    pub fn new(namespace: &str) -> Self {
        let writer = EventWriter::new_with_config(
            Vec::new(),
            EmitterConfig::new()
                .keep_element_names_stack(false)
                .write_document_declaration(false),
        );
        let mut builder = Self {
            writer,
            error: None,
        };
        builder.append_xml(XmlEvent::start_element("speak").default_ns(namespace).attr("version", "1.0"));
        builder
    }

    /// Changes the prosody of all subsequent speech until the corresponding
    /// [`end_prosody`](SsmlBuilder::end_prosody) call. The pitch attribute is omitted when `pitch`
    /// is `None`.
    pub fn start_prosody(
        &mut self,
        rate: RatePercent,
        volume: VolumeLevel,
        pitch: Option<SemitoneStep>,
    ) -> &mut Self {
        let rate = rate.to_string();
        let pitch = pitch.map(|pitch| pitch.to_string());

        let mut event =
            XmlEvent::start_element("prosody").attr("rate", &rate).attr("volume", volume.ssml_value());
        if let Some(pitch) = pitch.as_ref() {
            event = event.attr("pitch", pitch);
        }
        self.append_xml(event)
    }

    /// Emphasizes all subsequent speech until the corresponding
    /// [`end_emphasis`](SsmlBuilder::end_emphasis) call.
    pub fn start_emphasis(&mut self, level: EmphasisLevel) -> &mut Self {
        self.append_xml(XmlEvent::start_element("emphasis").attr("level", level.ssml_value()))
    }

    /// Appends text to pronounce. Markup characters are escaped.
    pub fn say<S: AsRef<str>>(&mut self, text: S) -> &mut Self {
        self.append_xml(XmlEvent::characters(text.as_ref()))
    }

    /// Appends a silence with a specified duration. Does not support sub-millisecond precision.
    pub fn silence(&mut self, duration: Duration) -> &mut Self {
        let time = format!("{}ms", duration.as_millis());
        self.append_xml(XmlEvent::start_element("break").attr("time", &time))
            .end_element("break")
    }

    /// Appends a break of the given strength.
    pub fn pause(&mut self, strength: BreakStrength) -> &mut Self {
        self.append_xml(XmlEvent::start_element("break").attr("strength", strength.ssml_value()))
            .end_element("break")
    }

    /// Ends the effect of the corresponding [`start_emphasis`](SsmlBuilder::start_emphasis) call.
    pub fn end_emphasis(&mut self) -> &mut Self {
        self.end_element("emphasis")
    }

    /// Ends the effect of the corresponding [`start_prosody`](SsmlBuilder::start_prosody) call.
    pub fn end_prosody(&mut self) -> &mut Self {
        self.end_element("prosody")
    }

    /// Closes the document and returns its serialized form.
    pub fn build(mut self) -> Result<String, EmitterError> {
        self.end_element("speak");
        if let Some(err) = self.error {
            return Err(err);
        }
        String::from_utf8(self.writer.into_inner())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into())
    }

    fn end_element(&mut self, name: &str) -> &mut Self {
        self.append_xml(XmlEvent::end_element().name(name))
    }

    fn append_xml<'a, E: Into<XmlEvent<'a>>>(&mut self, event: E) -> &mut Self {
        if self.error.is_none() {
            if let Err(err) = self.writer.write(event) {
                self.error = Some(err);
            }
        }
        self
    }
}
