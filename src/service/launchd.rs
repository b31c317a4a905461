// src/service/launchd.rs

//! launchd property list encoder

use crate::error::{Error, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

use super::{KeepAlive, ServiceDescriptor, ServiceEncoder};

const PLIST_DOCTYPE: &str =
    r#"plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd""#;

/// Encodes descriptors as launchd XML property lists
#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchdEncoder;

impl ServiceEncoder for LaunchdEncoder {
    fn extension(&self) -> &'static str {
        "plist"
    }

    fn encode(&self, descriptor: &ServiceDescriptor) -> Result<String> {
        let mut plist = Plist::new();

        plist.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        plist.event(Event::DocType(BytesText::from_escaped(PLIST_DOCTYPE)))?;
        plist.event(Event::Start(
            BytesStart::new("plist").with_attributes([("version", "1.0")]),
        ))?;
        plist.start("dict")?;

        plist.key("Label")?;
        plist.string(&descriptor.label)?;

        plist.key("ProgramArguments")?;
        plist.start("array")?;
        for arg in &descriptor.program_arguments {
            plist.string(arg)?;
        }
        plist.end("array")?;

        plist.key("KeepAlive")?;
        match descriptor.keep_alive {
            KeepAlive::Always => plist.boolean(true)?,
            KeepAlive::Never => plist.boolean(false)?,
            KeepAlive::NetworkState => plist.condition("NetworkState", true)?,
            KeepAlive::SuccessfulExit => plist.condition("SuccessfulExit", false)?,
            KeepAlive::Crashed => plist.condition("Crashed", true)?,
        }

        plist.key("RunAtLoad")?;
        plist.boolean(descriptor.run_at_load)?;

        let log_path = descriptor.log_path.to_string_lossy();
        plist.key("StandardOutPath")?;
        plist.string(&log_path)?;
        plist.key("StandardErrorPath")?;
        plist.string(&log_path)?;

        plist.end("dict")?;
        plist.end("plist")?;

        plist.finish()
    }
}

/// Thin wrapper mapping writer failures into [`Error::Encode`]
struct Plist {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl Plist {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| Error::Encode(e.to_string()))
    }

    fn start(&mut self, tag: &str) -> Result<()> {
        self.event(Event::Start(BytesStart::new(tag)))
    }

    fn end(&mut self, tag: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(tag)))
    }

    fn text_element(&mut self, tag: &str, text: &str) -> Result<()> {
        self.start(tag)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(tag)
    }

    fn key(&mut self, key: &str) -> Result<()> {
        self.text_element("key", key)
    }

    fn string(&mut self, value: &str) -> Result<()> {
        self.text_element("string", value)
    }

    fn boolean(&mut self, value: bool) -> Result<()> {
        let tag = if value { "true" } else { "false" };
        self.event(Event::Empty(BytesStart::new(tag)))
    }

    /// `<dict><key>name</key><bool/></dict>`
    fn condition(&mut self, name: &str, value: bool) -> Result<()> {
        self.start("dict")?;
        self.key(name)?;
        self.boolean(value)?;
        self.end("dict")
    }

    fn finish(self) -> Result<String> {
        let mut bytes = self.writer.into_inner().into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| Error::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{generate, ServiceInputs, ServiceOptions};
    use std::path::PathBuf;

    fn descriptor(keep_alive: Option<KeepAlive>) -> ServiceDescriptor {
        let inputs = ServiceInputs {
            binary: PathBuf::from("/opt/formulary/Cellar/transmission/2.94/bin/transmission-daemon"),
            config_dir: PathBuf::from("/opt/formulary/var/transmission/"),
            log_path: PathBuf::from("/opt/formulary/var/log/transmission-daemon.log"),
        };
        let mut options = ServiceOptions::new("org.formulary.transmission");
        options.daemon = true;
        options.keep_alive = keep_alive;
        options.args = vec![
            "--foreground".into(),
            "--config-dir".into(),
            "/opt/formulary/var/transmission/".into(),
            "--log-info".into(),
            "--logfile".into(),
            "/opt/formulary/var/log/transmission-daemon.log".into(),
        ];
        generate(&inputs, &options).unwrap()
    }

    #[test]
    fn test_encode_network_daemon() {
        let xml = LaunchdEncoder.encode(&descriptor(None)).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<!DOCTYPE plist PUBLIC"));
        assert!(xml.contains("<plist version=\"1.0\">"));
        assert!(xml.contains("<key>Label</key>"));
        assert!(xml.contains("<string>org.formulary.transmission</string>"));
        assert!(xml.contains(
            "<string>/opt/formulary/Cellar/transmission/2.94/bin/transmission-daemon</string>"
        ));
        assert!(xml.contains("<key>NetworkState</key>"));
        assert!(xml.contains("<key>RunAtLoad</key>"));
        assert!(!xml.contains("/opt/transmission/"));
        assert!(xml.trim_end().ends_with("</plist>"));

        // Program arguments stay in order
        let daemon = xml.find("transmission-daemon</string>").unwrap();
        let foreground = xml.find("<string>--foreground</string>").unwrap();
        let logfile = xml.find("<string>--logfile</string>").unwrap();
        assert!(daemon < foreground && foreground < logfile);
    }

    #[test]
    fn test_encode_keep_alive_variants() {
        let always = LaunchdEncoder.encode(&descriptor(Some(KeepAlive::Always))).unwrap();
        assert!(!always.contains("NetworkState"));
        assert!(always.contains("<true/>"));

        let exit = LaunchdEncoder.encode(&descriptor(Some(KeepAlive::SuccessfulExit))).unwrap();
        assert!(exit.contains("<key>SuccessfulExit</key>"));
        assert!(exit.contains("<false/>"));
    }

    #[test]
    fn test_encode_escapes_text() {
        let mut d = descriptor(None);
        d.program_arguments.push("a<b&c".into());
        let xml = LaunchdEncoder.encode(&d).unwrap();
        assert!(xml.contains("<string>a&lt;b&amp;c</string>"));
    }
}
