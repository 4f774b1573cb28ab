use std::path::Path;
use std::sync::Arc;

use sword_module::backends::RawFileBackend;
use sword_module::keys::OrdinalVersification;
use sword_module::storage::{DataIndex, SizeWidth};
use sword_module::utils::{get_compressor, CompressionMethod};
use sword_module::{open_backend, BookType, Key, KeyList, ModuleConfig, ModuleError};

const OT: &[&str] = &["In the beginning", "And the earth", "", "And God said"];
const NT: &[&str] = &["The book of the generation", "Abraham begat Isaac"];

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn versification() -> Arc<OrdinalVersification> {
    Arc::new(OrdinalVersification::new("Test", OT.len() as u32, NT.len() as u32))
}

fn write_raw(dir: &Path, prefix: &str, verses: &[&str]) {
    let (mut index, mut data) = (Vec::new(), Vec::new());
    for verse in verses {
        index.extend(DataIndex::new(data.len() as u32, verse.len() as i32).encode(SizeWidth::U16).unwrap());
        data.extend_from_slice(verse.as_bytes());
    }
    std::fs::write(dir.join(prefix), data).unwrap();
    std::fs::write(dir.join(format!("{}.vss", prefix)), index).unwrap();
}

/// One compressed block per pair of verses.
fn write_ztext(dir: &Path, prefix: &str, verses: &[&str], method: CompressionMethod) {
    let compressor = get_compressor(method);
    let (mut comp, mut blocks, mut text) = (Vec::new(), Vec::new(), Vec::new());
    for (block_no, chunk) in verses.chunks(2).enumerate() {
        let mut plain = Vec::new();
        for verse in chunk {
            comp.extend((block_no as u32).to_le_bytes());
            comp.extend((plain.len() as u32).to_le_bytes());
            comp.extend((verse.len() as u16).to_le_bytes());
            plain.extend_from_slice(verse.as_bytes());
        }
        let packed = compressor.compress(&plain).unwrap();
        blocks.extend((text.len() as u32).to_le_bytes());
        blocks.extend((packed.len() as u32).to_le_bytes());
        blocks.extend((plain.len() as u32).to_le_bytes());
        text.extend(packed);
    }
    std::fs::write(dir.join(format!("{}.czv", prefix)), comp).unwrap();
    std::fs::write(dir.join(format!("{}.czs", prefix)), blocks).unwrap();
    std::fs::write(dir.join(format!("{}.czz", prefix)), text).unwrap();
}

fn config_json(name: &str, driver: &str, path: &Path, extra: &str) -> ModuleConfig {
    let json = format!(
        r#"{{"Name": "{}", "ModDrv": "{}", "DataPath": {}, "Encoding": "UTF-8"{}}}"#,
        name,
        driver,
        serde_json::to_string(&path.to_string_lossy()).unwrap(),
        extra
    );
    ModuleConfig::from_json(&json).unwrap()
}

#[test]
fn test_raw_text_from_json_config() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    write_raw(dir.path(), "ot", OT);
    write_raw(dir.path(), "nt", NT);
    let v11n = versification();

    let backend = open_backend(config_json("Raw", "RawText", dir.path(), ""), v11n.clone()).unwrap();
    assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(0))).unwrap(), "In the beginning");
    assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(2))).unwrap(), "");
    assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(5))).unwrap(), "Abraham begat Isaac");

    let err = backend.set_raw_text(&Key::Verse(v11n.key(0)), "changed").unwrap_err();
    assert!(matches!(err, ModuleError::ReadOnly { .. }));
    assert_eq!(backend.read_index().unwrap().len(), 5);
}

#[test]
fn test_compressed_text_matches_raw_text() {
    init_logger();
    let v11n = versification();
    let raw_dir = tempfile::tempdir().unwrap();
    write_raw(raw_dir.path(), "ot", OT);
    write_raw(raw_dir.path(), "nt", NT);
    let raw = open_backend(ModuleConfig::new("Raw", BookType::RawText, raw_dir.path()), v11n.clone()).unwrap();

    for method in [CompressionMethod::Zip, CompressionMethod::Bzip2, CompressionMethod::Xz] {
        let z_dir = tempfile::tempdir().unwrap();
        write_ztext(z_dir.path(), "ot", OT, method);
        write_ztext(z_dir.path(), "nt", NT, method);
        let label = format!("{:?}", method).to_uppercase();
        let extra = format!(r#", "CompressType": "{}", "BlockType": "CHAPTER""#, label);
        let compressed = open_backend(config_json("Z", "zText", z_dir.path(), &extra), v11n.clone()).unwrap();

        for ordinal in 0..(OT.len() + NT.len()) as u32 {
            let key = Key::Verse(v11n.key(ordinal));
            assert_eq!(compressed.get_raw_text(&key).unwrap(), raw.get_raw_text(&key).unwrap());
            assert_eq!(compressed.contains(&key), raw.contains(&key));
        }
    }
}

#[test]
fn test_raw_files_write_and_reopen() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let v11n = versification();
    let config = ModuleConfig::new("Notes", BookType::RawFiles, dir.path());
    drop(RawFileBackend::create(config.clone(), v11n.clone()).unwrap());

    let backend = open_backend(config.clone(), v11n.clone()).unwrap();
    assert!(backend.is_writable());
    backend.set_raw_text(&Key::Verse(v11n.key(1)), "A personal note").unwrap();
    backend.set_alias_key(&Key::Verse(v11n.key(3)), &Key::Verse(v11n.key(1))).unwrap();
    drop(backend);

    let reopened = open_backend(config, v11n.clone()).unwrap();
    assert_eq!(reopened.get_raw_text(&Key::Verse(v11n.key(1))).unwrap(), "A personal note");
    assert_eq!(reopened.get_raw_text(&Key::Verse(v11n.key(3))).unwrap(), "A personal note");
    assert_eq!(reopened.get_raw_text(&Key::Verse(v11n.key(0))).unwrap(), "");
}

#[test]
fn test_dictionary_through_open_backend() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("names");
    let (mut idx, mut dat) = (Vec::new(), Vec::new());
    for record in ["ABEL\nSecond son", "CAIN\nFirst son", "SETH\n@LINK ABEL"] {
        idx.extend(DataIndex::new(dat.len() as u32, record.len() as i32).encode(SizeWidth::U16).unwrap());
        dat.extend(record.as_bytes());
    }
    std::fs::write(dir.path().join("names.idx"), idx).unwrap();
    std::fs::write(dir.path().join("names.dat"), dat).unwrap();

    let backend = open_backend(ModuleConfig::new("Names", BookType::RawLd, stem), versification()).unwrap();
    let KeyList::Entries(entries) = backend.read_index().unwrap() else {
        panic!("dictionary should list entries");
    };
    let texts: Vec<String> = entries.into_iter().map(|key| backend.get_raw_text(&Key::Index(key)).unwrap()).collect();
    assert_eq!(texts, ["Second son", "First son", "Second son"]);
}

#[test]
fn test_missing_module_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = open_backend(ModuleConfig::new("Empty", BookType::ZText, dir.path()), versification()).err().unwrap();
    assert!(matches!(err, ModuleError::Configuration { .. }));
}
