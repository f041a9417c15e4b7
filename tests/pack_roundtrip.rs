use std::fs::File;
use std::io::Write;
use std::path::Path;

use pretty_assertions::assert_eq;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use langmap_translator::pack::archive::{ArchiveSource, ResourceSource};
use langmap_translator::pack::locate::{load_batch, load_unit};
use langmap_translator::pack::writer::{write_resource_pack_file, PackEntry, PackSettings};
use langmap_translator::pipeline::reconcile::scan_blocks;
use langmap_translator::pipeline::{
    ChunkLimit, RequestFormatter, StrayKeyPolicy, TranslationSession,
};
use langmap_translator::pipeline::export::RequestWriter;
use langmap_translator::{KeyMap, PipelineError};

fn write_jar(path: &Path, entries: &[(&str, &str)]) {
    let f = File::create(path).expect("create jar");
    let mut zout = ZipWriter::new(f);
    for (name, body) in entries {
        zout.start_file(*name, SimpleFileOptions::default()).expect("start");
        zout.write_all(body.as_bytes()).expect("write");
    }
    zout.finish().expect("finish");
}

fn source_json(n: usize) -> String {
    let map: KeyMap = (0..n)
        .map(|i| (format!("item.gadget_{i:03}"), format!("\u{00A7}eGadget {{{i}}} %s")))
        .collect();
    map.to_pretty_json()
}

/// Stands in for the external translator: answers each request with only
/// its JSON block, values rewritten.
fn fake_translate(request: &str) -> String {
    let (blocks, _) = scan_blocks(request);
    let block = blocks.last().expect("request carries a block");
    let map = KeyMap::parse_block(block.text).expect("request block parses");
    let translated: KeyMap = map
        .iter()
        .map(|(k, v)| (k.to_string(), v.replace("Gadget", "Штуковина")))
        .collect();
    translated.to_pretty_json()
}

#[test]
fn jar_to_resource_pack() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let jar = tmp.path().join("gadgets.jar");
    write_jar(
        &jar,
        &[
            ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"),
            ("assets/gadgets/lang/en_us.json", source_json(30).as_str()),
            (
                "assets/gadgets/lang/ru_ru.json",
                "{\"item.gadget_000\": \"Готово\", \"legacy.key\": \"Старое\"}",
            ),
        ],
    );

    let unit = load_unit(&jar, None, "en_us", "ru_ru").expect("load unit");
    assert_eq!(unit.identifier(), "gadgets");
    let session = TranslationSession::start(unit, ChunkLimit::Keys(12));
    assert_eq!(session.delta().len(), 29);
    assert_eq!(session.chunks().len(), 3);

    let requests = session
        .requests(&RequestFormatter::new("Russian"))
        .expect("requests");
    assert!(requests[1].text.contains("This is part 2 of 3."));

    // Answers pasted back to back, out of the original formatting, with chatter around one.
    let pasted = format!(
        "{}\n\n{}Sure! Here is the last part:\n```json\n{}\n```",
        fake_translate(&requests[0].text),
        fake_translate(&requests[1].text),
        fake_translate(&requests[2].text),
    );
    let outcome = session
        .import_responses(&pasted, StrayKeyPolicy::Accept)
        .expect("import");
    assert_eq!(outcome.report.blocks_parsed, 3);
    assert!(outcome.still_missing.is_empty());
    assert_eq!(outcome.final_map.len(), 31);
    assert_eq!(outcome.final_map.get("item.gadget_000"), Some("Готово"));
    assert_eq!(outcome.final_map.get("legacy.key"), Some("Старое"));
    assert_eq!(
        outcome.final_map.get("item.gadget_017"),
        Some("\u{00A7}eШтуковина {17} %s")
    );

    let pack_path = tmp.path().join("pack.zip");
    let written = write_resource_pack_file(
        &pack_path,
        &PackSettings::default(),
        &[PackEntry {
            identifier: session.unit().identifier().to_string(),
            map: outcome.final_map.clone(),
        }],
    )
    .expect("write pack");
    assert_eq!(written, 1);

    let mut pack = ArchiveSource::open(&pack_path).expect("open pack");
    let text = pack
        .read_text("assets/gadgets/lang/ru_ru.json")
        .expect("lang file");
    assert_eq!(KeyMap::parse_resource(&text).expect("parse"), outcome.final_map);
}

#[test]
fn rerunning_export_reproduces_identical_requests() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let jar = tmp.path().join("gadgets.jar");
    write_jar(&jar, &[("assets/gadgets/lang/en_us.json", source_json(80).as_str())]);

    let formatter = RequestFormatter::new("Russian");
    let run = || {
        let unit = load_unit(&jar, None, "en_us", "ru_ru").expect("load unit");
        TranslationSession::start(unit, ChunkLimit::Chars(1_200))
            .requests(&formatter)
            .expect("requests")
    };
    assert_eq!(run(), run());
}

#[test]
fn prose_answer_produces_no_pack() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let jar = tmp.path().join("gadgets.jar");
    write_jar(&jar, &[("assets/gadgets/lang/en_us.json", source_json(3).as_str())]);

    let unit = load_unit(&jar, None, "en_us", "ru_ru").expect("load unit");
    let session = TranslationSession::start(unit, ChunkLimit::default());
    let err = session
        .import_responses("I'm sorry, the text was too long to translate.", StrayKeyPolicy::Accept)
        .expect_err("prose");
    assert!(matches!(err, PipelineError::NoValidPayload { .. }));
}

#[test]
fn jar_without_source_language_fails_to_load() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let jar = tmp.path().join("textures.jar");
    write_jar(&jar, &[("assets/gadgets/textures/a.png", "png")]);

    let err = load_unit(&jar, None, "en_us", "ru_ru").expect_err("no source");
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::MissingSourceData(_))
    ));
}

#[test]
fn several_jars_go_into_one_pack() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let done = tmp.path().join("done.jar");
    let partial = tmp.path().join("gadgets.jar");
    let junk = tmp.path().join("textures.jar");
    write_jar(
        &done,
        &[
            ("assets/done/lang/en_us.json", "{\"block.lamp\": \"Lamp\"}"),
            ("assets/done/lang/ru_ru.json", "{\"block.lamp\": \"Лампа\"}"),
        ],
    );
    write_jar(
        &partial,
        &[
            ("assets/gadgets/lang/en_us.json", source_json(20).as_str()),
            ("assets/gadgets/lang/ru_ru.json", "{\"item.gadget_000\": \"Готово\"}"),
        ],
    );
    write_jar(&junk, &[("assets/gadgets/textures/a.png", "png")]);

    let inputs = vec![done, junk.clone(), partial];
    let loaded =
        load_batch(&inputs, None, "en_us", "ru_ru", ChunkLimit::Keys(8)).expect("load batch");
    assert_eq!(loaded.failures.len(), 1);
    assert_eq!(loaded.failures[0].input, junk);
    let batch = loaded.batch;
    assert_eq!(batch.len(), 2);
    assert!(batch.sessions()[0].is_complete());
    assert!(!batch.is_complete());

    let requests = batch.requests(&RequestFormatter::new("Russian")).expect("requests");
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.identifier == "gadgets"));

    let writer = RequestWriter::new(tmp.path().join("requests")).expect("request dir");
    for r in &requests {
        writer.write_part(&r.identifier, &r.payload).expect("write request");
    }
    assert!(writer.dir().join("gadgets.part_03_of_03.txt").exists());

    let pasted = requests
        .iter()
        .map(|r| fake_translate(&r.payload.text))
        .collect::<Vec<_>>()
        .join("\n");
    let outcome = batch
        .import_responses(&pasted, StrayKeyPolicy::Accept)
        .expect("import");
    assert_eq!(outcome.report.blocks_parsed, 3);
    assert!(outcome.units.iter().all(|u| u.still_missing.is_empty()));

    let pack_path = tmp.path().join("pack.zip");
    let written = write_resource_pack_file(&pack_path, &PackSettings::default(), &outcome.pack_entries())
        .expect("write pack");
    assert_eq!(written, 2);

    let mut pack = ArchiveSource::open(&pack_path).expect("open pack");
    assert_eq!(
        pack.entry_names(),
        vec![
            "pack.mcmeta",
            "assets/done/lang/ru_ru.json",
            "assets/gadgets/lang/ru_ru.json"
        ]
    );
    let done_map =
        KeyMap::parse_resource(&pack.read_text("assets/done/lang/ru_ru.json").expect("done"))
            .expect("parse");
    assert_eq!(done_map.get("block.lamp"), Some("Лампа"));
    let gadgets = KeyMap::parse_resource(
        &pack.read_text("assets/gadgets/lang/ru_ru.json").expect("gadgets"),
    )
    .expect("parse");
    assert_eq!(gadgets.len(), 20);
    assert_eq!(gadgets.get("item.gadget_000"), Some("Готово"));
    assert_eq!(gadgets.get("item.gadget_019"), Some("\u{00A7}eШтуковина {19} %s"));
}
