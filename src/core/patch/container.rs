use std::fmt;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::error::{LauncherError, LauncherResult};

/// Local file header / empty-archive signatures of a zip file.
const ZIP_SIGNATURES: [&[u8; 4]; 2] = [b"PK\x03\x04", b"PK\x05\x06"];

/// On-disk layout of a patch container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchFormat {
    /// Zip archive holding a single JSON payload entry.
    ContainerArchive,
    /// Base64 text of the JSON payload.
    LegacyEncodedText,
}

/// A decoded patch: the JSON payload plus the exact text it was read from.
#[derive(Debug, Clone)]
pub struct PatchContainer {
    pub format: PatchFormat,
    pub payload: serde_json::Value,
    raw_json: String,
    /// SHA-1 hex of the payload bytes.
    pub content_digest: String,
}

/// `client_version` is an integer in current generators and a string in
/// some older ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientVersion {
    Number(i64),
    Text(String),
}

impl fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientVersion::Number(n) => write!(f, "{}", n),
            ClientVersion::Text(s) => write!(f, "{}", s),
        }
    }
}

/// The payload fields this client reads. Generators may add more.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadInfo {
    #[serde(default)]
    pub client_version: Option<ClientVersion>,
    #[serde(default)]
    pub seed_name: Option<String>,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub player_id: Option<i64>,
    #[serde(default)]
    pub race: Option<bool>,
}

impl PatchContainer {
    pub fn from_payload(payload: serde_json::Value) -> LauncherResult<Self> {
        let raw_json = serde_json::to_string(&payload)?;
        Ok(Self::from_parts(PatchFormat::ContainerArchive, payload, raw_json))
    }

    fn from_parts(format: PatchFormat, payload: serde_json::Value, raw_json: String) -> Self {
        let content_digest = hex::encode(Sha1::digest(raw_json.as_bytes()));
        Self {
            format,
            payload,
            raw_json,
            content_digest,
        }
    }

    /// Typed view of the consumed payload fields.
    pub fn info(&self) -> PayloadInfo {
        serde_json::from_value(self.payload.clone()).unwrap_or_default()
    }

    /// Payload as legacy base64 text. Always ASCII.
    pub fn to_legacy_text(&self) -> String {
        STANDARD.encode(self.raw_json.as_bytes())
    }
}

/// Codec parameterised by the name of the payload entry inside archives.
#[derive(Debug, Clone)]
pub struct PatchCodec {
    entry_name: String,
}

impl Default for PatchCodec {
    fn default() -> Self {
        Self::new("data.json")
    }
}

impl PatchCodec {
    pub fn new(entry_name: impl Into<String>) -> Self {
        Self {
            entry_name: entry_name.into(),
        }
    }

    pub fn detect_format(bytes: &[u8]) -> PatchFormat {
        if ZIP_SIGNATURES.iter().any(|sig| bytes.starts_with(*sig)) {
            PatchFormat::ContainerArchive
        } else {
            PatchFormat::LegacyEncodedText
        }
    }

    pub fn decode(&self, path: &Path) -> LauncherResult<PatchContainer> {
        let bytes = std::fs::read(path).map_err(LauncherError::io(path))?;
        self.decode_bytes(&bytes, path)
    }

    /// Decode in-memory container bytes; `origin` is only used in errors.
    pub fn decode_bytes(&self, bytes: &[u8], origin: &Path) -> LauncherResult<PatchContainer> {
        match Self::detect_format(bytes) {
            PatchFormat::ContainerArchive => self.decode_archive(bytes, origin),
            PatchFormat::LegacyEncodedText => decode_legacy(bytes, origin),
        }
    }

    fn decode_archive(&self, bytes: &[u8], origin: &Path) -> LauncherResult<PatchContainer> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| LauncherError::format(origin, format!("unreadable archive: {}", e)))?;

        let matching = archive
            .file_names()
            .filter(|name| *name == self.entry_name)
            .count();
        if matching != 1 {
            return Err(LauncherError::format(
                origin,
                format!(
                    "archive must contain exactly one {} entry, found {}",
                    self.entry_name, matching
                ),
            ));
        }

        let mut raw_json = String::new();
        archive
            .by_name(&self.entry_name)
            .map_err(|e| LauncherError::format(origin, e.to_string()))?
            .read_to_string(&mut raw_json)
            .map_err(|e| {
                LauncherError::format(origin, format!("{} is not UTF-8: {}", self.entry_name, e))
            })?;

        let payload = parse_payload(&raw_json, origin)?;
        Ok(PatchContainer::from_parts(
            PatchFormat::ContainerArchive,
            payload,
            raw_json,
        ))
    }

    /// Write `container` to `path` in `target` layout, replacing any file there.
    pub fn encode(
        &self,
        container: &PatchContainer,
        path: &Path,
        target: PatchFormat,
    ) -> LauncherResult<()> {
        let bytes = match target {
            PatchFormat::LegacyEncodedText => container.to_legacy_text().into_bytes(),
            PatchFormat::ContainerArchive => self.archive_bytes(container)?,
        };
        std::fs::write(path, bytes).map_err(LauncherError::io(path))
    }

    fn archive_bytes(&self, container: &PatchContainer) -> LauncherResult<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file(self.entry_name.as_str(), options)?;
        writer.write_all(container.raw_json.as_bytes())?;
        Ok(writer.finish()?.into_inner())
    }
}

fn decode_legacy(bytes: &[u8], origin: &Path) -> LauncherResult<PatchContainer> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| LauncherError::format(origin, "legacy container is not text"))?;
    let decoded = STANDARD
        .decode(text.trim())
        .map_err(|e| LauncherError::format(origin, format!("invalid base64: {}", e)))?;
    let raw_json = String::from_utf8(decoded)
        .map_err(|_| LauncherError::format(origin, "decoded payload is not UTF-8"))?;
    let payload = parse_payload(&raw_json, origin)?;
    Ok(PatchContainer::from_parts(
        PatchFormat::LegacyEncodedText,
        payload,
        raw_json,
    ))
}

fn parse_payload(raw_json: &str, origin: &Path) -> LauncherResult<serde_json::Value> {
    serde_json::from_str(raw_json)
        .map_err(|e| LauncherError::format(origin, format!("payload is not JSON: {}", e)))
}

/// Point a legacy-encoded payload at a different server.
pub fn update_connection(legacy_text: &str, server: &str, port: u16) -> LauncherResult<String> {
    let container = decode_legacy(legacy_text.as_bytes(), Path::new("<memory>"))?;
    let mut payload = container.payload;
    let Some(fields) = payload.as_object_mut() else {
        return Err(LauncherError::format(
            "<memory>",
            "payload is not a JSON object",
        ));
    };
    fields.insert("server".into(), server.into());
    fields.insert("port".into(), port.into());
    Ok(PatchContainer::from_payload(payload)?.to_legacy_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> serde_json::Value {
        json!({
            "world_seed": 1234,
            "seed_name": "AP_0123",
            "player_name": "Ünïcødé Steve",
            "player_id": 2,
            "client_version": 9,
            "race": false,
        })
    }

    fn write_archive(dir: &Path, entries: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.join("AP_0123_P2_Steve.apmc");
        let mut writer = ZipWriter::new(std::fs::File::create(&path).unwrap());
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn archive_to_legacy_preserves_payload() {
        let dir = tempfile::tempdir().unwrap();
        let codec = PatchCodec::default();
        let source = PatchContainer::from_payload(sample_payload()).unwrap();

        let archive = dir.path().join("in.apmc");
        codec
            .encode(&source, &archive, PatchFormat::ContainerArchive)
            .unwrap();
        let from_archive = codec.decode(&archive).unwrap();
        assert_eq!(from_archive.format, PatchFormat::ContainerArchive);

        let legacy = dir.path().join("out.apmc");
        codec
            .encode(&from_archive, &legacy, PatchFormat::LegacyEncodedText)
            .unwrap();
        let text = std::fs::read_to_string(&legacy).unwrap();
        assert!(text.is_ascii());

        let from_legacy = codec.decode(&legacy).unwrap();
        assert_eq!(from_legacy.format, PatchFormat::LegacyEncodedText);
        assert_eq!(from_legacy.payload, sample_payload());
        assert_eq!(from_legacy.content_digest, from_archive.content_digest);
    }

    #[test]
    fn legacy_to_archive_preserves_payload() {
        let dir = tempfile::tempdir().unwrap();
        let codec = PatchCodec::default();
        let legacy = dir.path().join("old.apmc");
        std::fs::write(
            &legacy,
            PatchContainer::from_payload(sample_payload())
                .unwrap()
                .to_legacy_text(),
        )
        .unwrap();

        let from_legacy = codec.decode(&legacy).unwrap();
        let archive = dir.path().join("new.apmc");
        codec
            .encode(&from_legacy, &archive, PatchFormat::ContainerArchive)
            .unwrap();
        assert_eq!(
            PatchCodec::detect_format(&std::fs::read(&archive).unwrap()),
            PatchFormat::ContainerArchive
        );

        let from_archive = codec.decode(&archive).unwrap();
        assert_eq!(from_archive.payload, sample_payload());
        assert_eq!(from_archive.content_digest, from_legacy.content_digest);
    }

    #[test]
    fn any_json_payload_survives_both_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let codec = PatchCodec::new("payload.json");
        let payloads = [
            json!([1, "two", {"three": 3.5}, null]),
            json!("Ünïcødé ✓ \"quoted\""),
            json!({"nested": {"names": ["Ålex", "斯蒂夫"], "block": "🧱", "deep": [[[]]]}}),
        ];
        let layouts = [PatchFormat::ContainerArchive, PatchFormat::LegacyEncodedText];

        for (i, payload) in payloads.iter().enumerate() {
            for source_layout in layouts {
                let source = dir.path().join(format!("{}-{:?}.apmc", i, source_layout));
                codec
                    .encode(
                        &PatchContainer::from_payload(payload.clone()).unwrap(),
                        &source,
                        source_layout,
                    )
                    .unwrap();
                let decoded = codec.decode(&source).unwrap();
                assert_eq!(decoded.format, source_layout);
                assert_eq!(&decoded.payload, payload);

                for target_layout in layouts {
                    let target = dir.path().join(format!("{}-{:?}-out.apmc", i, target_layout));
                    codec.encode(&decoded, &target, target_layout).unwrap();
                    let again = codec.decode(&target).unwrap();
                    assert_eq!(again.format, target_layout);
                    assert_eq!(
                        again.payload, decoded.payload,
                        "{source_layout:?} -> {target_layout:?}"
                    );
                    assert_eq!(again.content_digest, decoded.content_digest);
                }
            }
        }
    }

    #[test]
    fn archive_allows_sidecar_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(
            dir.path(),
            &[
                ("archipelago.json", r#"{"game":"Minecraft"}"#),
                ("data.json", r#"{"client_version": 9, "race": true}"#),
            ],
        );

        let container = PatchCodec::default().decode(&path).unwrap();
        let info = container.info();
        assert_eq!(info.client_version, Some(ClientVersion::Number(9)));
        assert_eq!(info.race, Some(true));
    }

    #[test]
    fn archive_without_payload_entry_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(dir.path(), &[("other.json", "{}")]);
        let err = PatchCodec::default().decode(&path).unwrap_err();
        assert!(matches!(err, LauncherError::Format { .. }));
    }

    #[test]
    fn archive_with_invalid_json_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_archive(dir.path(), &[("data.json", "{not json")]);
        let err = PatchCodec::default().decode(&path).unwrap_err();
        assert!(matches!(err, LauncherError::Format { .. }));
    }

    #[test]
    fn zip_signature_always_selects_archive_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.apmc");
        std::fs::write(&path, b"PK\x03\x04garbage that is not a zip").unwrap();

        assert_eq!(
            PatchCodec::detect_format(&std::fs::read(&path).unwrap()),
            PatchFormat::ContainerArchive
        );
        let err = PatchCodec::default().decode(&path).unwrap_err();
        assert!(err.to_string().contains("unreadable archive"));
    }

    #[test]
    fn legacy_text_with_surrounding_whitespace_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.apmc");
        let encoded = STANDARD.encode(r#"{"client_version":"7","seed_name":"S"}"#);
        std::fs::write(&path, format!("  {}\n", encoded)).unwrap();

        let container = PatchCodec::default().decode(&path).unwrap();
        assert_eq!(container.format, PatchFormat::LegacyEncodedText);
        assert_eq!(
            container.info().client_version,
            Some(ClientVersion::Text("7".into()))
        );
    }

    #[test]
    fn non_base64_or_non_json_text_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let codec = PatchCodec::default();

        let not_base64 = dir.path().join("a.apmc");
        std::fs::write(&not_base64, "definitely *not* base64!").unwrap();
        assert!(matches!(
            codec.decode(&not_base64).unwrap_err(),
            LauncherError::Format { .. }
        ));

        let not_json = dir.path().join("b.apmc");
        std::fs::write(&not_json, STANDARD.encode("plain words")).unwrap();
        assert!(matches!(
            codec.decode(&not_json).unwrap_err(),
            LauncherError::Format { .. }
        ));
    }

    #[test]
    fn update_connection_sets_server_and_port() {
        let legacy = PatchContainer::from_payload(sample_payload())
            .unwrap()
            .to_legacy_text();
        let updated = update_connection(&legacy, "archipelago.gg", 38281).unwrap();

        let decoded = decode_legacy(updated.as_bytes(), Path::new("x")).unwrap();
        assert_eq!(decoded.payload["server"], "archipelago.gg");
        assert_eq!(decoded.payload["port"], 38281);
        assert_eq!(decoded.payload["seed_name"], "AP_0123");
    }
}
