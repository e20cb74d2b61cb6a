use crate::common::{argv, write_all, TmpDir};

use fillet::ChunkSource;

use fillet_driver::generators::{
    read_path_list, resolve_encoding, split_weight, PatternSource, SourceFactory, TextEncoder,
};
use fillet_driver::{parse_command, NewlineMode, PumpMode};

use encoding::Encoding;

use rand::rngs::StdRng;
use rand::SeedableRng;

use std::collections::HashSet;
use std::path::PathBuf;

fn factory(args: &[&str]) -> fillet::Result<SourceFactory> {
    let cmd = parse_command(&argv(args))?;
    SourceFactory::from_cmd(&cmd, StdRng::seed_from_u64(7))
}

fn tokens(source: &mut dyn ChunkSource, n: usize) -> Vec<String> {
    (0..n)
        .map(|_| String::from_utf8(source.next_chunk().unwrap()).unwrap())
        .collect()
}

fn pattern(mode: PumpMode, chunk: usize) -> PatternSource {
    PatternSource::new(mode, chunk, StdRng::seed_from_u64(1))
}

#[test]
fn fixed_patterns() {
    assert_eq!(pattern(PumpMode::Bin1, 5).next_chunk().unwrap(), vec![0xFF; 5]);
    assert_eq!(pattern(PumpMode::Bin0, 5).next_chunk().unwrap(), vec![0; 5]);
}

#[test]
fn random_patterns() {
    let utf8 = pattern(PumpMode::RandUtf8, 1000).next_chunk().unwrap();
    assert_eq!(utf8.len(), 1000);
    assert!(utf8.iter().all(|&b| b >= 0x21 && b <= 0x7E));

    let hex = pattern(PumpMode::RandHex, 9).next_chunk().unwrap();
    assert_eq!(hex.len(), 8);
    assert!(hex.iter().all(|b| b"0123456789abcdef".contains(b)));
    assert_eq!(pattern(PumpMode::RandHex, 1).next_chunk().unwrap().len(), 2);

    let bin = pattern(PumpMode::RandBin, 4096).next_chunk().unwrap();
    assert_eq!(bin.len(), 4096);
    assert!(bin.iter().any(|&b| b != 0));
}

#[test]
fn forked_patterns_differ() {
    let mut source = pattern(PumpMode::RandBin, 64);
    let mut a = source.fork().unwrap();
    let mut b = source.fork().unwrap();
    assert_ne!(a.next_chunk().unwrap(), b.next_chunk().unwrap());
}

#[test]
fn newline_insertion() {
    let utf8 = resolve_encoding("utf-8", None).unwrap();
    let by_word = TextEncoder::new(utf8, NewlineMode::Word, "\r\n");
    assert_eq!(by_word.encode("ab").unwrap(), b"ab\r\n".to_vec());
    let by_char = TextEncoder::new(utf8, NewlineMode::Char, "\n");
    assert_eq!(by_char.encode("ab").unwrap(), b"a\nb\n".to_vec());
    let none = TextEncoder::new(utf8, NewlineMode::None, "\n");
    assert_eq!(none.encode("ab").unwrap(), b"ab".to_vec());
}

#[test]
fn target_encoding() {
    let latin = resolve_encoding("windows-1252", None).unwrap();
    let text = TextEncoder::new(latin, NewlineMode::None, "\n");
    assert_eq!(text.encode("café").unwrap(), vec![b'c', b'a', b'f', 0xE9]);

    let utf16 = resolve_encoding("utf-16le", None).unwrap();
    let text = TextEncoder::new(utf16, NewlineMode::None, "\n");
    assert_eq!(text.encode("hi").unwrap(), vec![b'h', 0, b'i', 0]);

    assert_eq!(resolve_encoding("nope", None).err().unwrap().exit_code(), 2);
}

#[test]
fn auto_encoding_detection() {
    let tmp = TmpDir::new();
    let utf8 = tmp.file("utf8.txt");
    write_all(&utf8, "naïve café déjà vu\n".repeat(20));
    let detected = resolve_encoding("auto", Some(PathBuf::from(&utf8).as_path())).unwrap();
    assert_eq!(detected.name(), "utf-8");

    let latin = tmp.file("latin.txt");
    let bytes: Vec<u8> = b"caf\xe9 na\xefve d\xe9j\xe0 vu\n".repeat(20);
    write_all(&latin, bytes);
    let detected = resolve_encoding("auto", Some(PathBuf::from(&latin).as_path())).unwrap();
    assert_ne!(detected.name(), "utf-8");

    assert_eq!(resolve_encoding("auto", None).unwrap().name(), "utf-8");
}

#[test]
fn weights_are_trailing_numbers() {
    assert_eq!(split_weight("hello 2.5"), (String::from("hello"), Some(2.5)));
    assert_eq!(split_weight("big apple 3"), (String::from("big apple"), Some(3.0)));
    assert_eq!(split_weight("hello"), (String::from("hello"), None));
    assert_eq!(split_weight("route 66a"), (String::from("route 66a"), None));
    assert_eq!(split_weight("v 1.2.3"), (String::from("v 1.2.3"), None));
    assert_eq!(split_weight("42"), (String::from("42"), None));
}

#[test]
fn path_lists_resolve_relative_entries() {
    let tmp = TmpDir::new();
    let list = tmp.file("list.txt");
    write_all(&list, "# dictionaries\nwords.txt\n\n  sub/more.txt  \n");
    let paths = read_path_list(PathBuf::from(&list).as_path()).unwrap();
    assert_eq!(
        paths,
        vec![
            tmp.path().join("words.txt"),
            tmp.path().join("sub/more.txt"),
        ]
    );
}

#[test]
fn word_modes() {
    let mut f = factory(&["--word=Ab", "--newline-mode=word"]).unwrap();
    assert_eq!(f.chunk_len().unwrap(), Some(3));
    assert_eq!(tokens(f.source().unwrap().as_mut(), 3), vec!["Ab\n"; 3]);

    let mut f = factory(&["--word=Ab", "--mode=random"]).unwrap();
    assert_eq!(f.chunk_len().unwrap(), None);
    let seen: HashSet<String> = tokens(f.source().unwrap().as_mut(), 64).into_iter().collect();
    assert!(seen.iter().all(|t| t == "ab" || t == "AB"));
    assert_eq!(seen.len(), 2);

    assert_eq!(factory(&[]).err().unwrap().exit_code(), 2);
    assert_eq!(
        factory(&["--pump-mode=bin1", "--chunk=0"]).err().unwrap().exit_code(),
        2
    );
}

#[test]
fn ordered_dictionary() {
    let tmp = TmpDir::new();
    let dict = tmp.file("dict.txt");
    write_all(&dict, "pear\napple\n\nfig\n");

    let mut f = factory(&["--dict", &dict, "--dict-order=sequential"]).unwrap();
    let mut source = f.source().unwrap();
    assert_eq!(tokens(source.as_mut(), 4), vec!["pear", "apple", "fig", "pear"]);
    assert!(source.fork().is_none());

    let mut f = factory(&["--dict", &dict, "--dict-order=reverse"]).unwrap();
    assert_eq!(tokens(f.source().unwrap().as_mut(), 3), vec!["fig", "apple", "pear"]);

    let mut f = factory(&["--dict", &dict, "--dict-order=presorted"]).unwrap();
    assert_eq!(tokens(f.source().unwrap().as_mut(), 4), vec!["apple", "fig", "pear", "apple"]);
}

#[test]
fn streamed_dictionaries_in_list_order() {
    let tmp = TmpDir::new();
    write_all(tmp.file("a.txt"), "one\ntwo\n");
    write_all(tmp.file("b.txt"), "three\n");
    let list = tmp.file("dicts.lst");
    write_all(&list, "a.txt\nb.txt\n");

    let mut f = factory(&["--dict-list", &list, "--dict-order=sequential"]).unwrap();
    assert_eq!(
        tokens(f.source().unwrap().as_mut(), 5),
        vec!["one", "two", "three", "one", "two"]
    );

    // Non-sequential orders need the words in memory.
    let err = factory(&["--dict-list", &list, "--dict-order=random"]).err().unwrap();
    assert_eq!(err.exit_code(), 2);
    let mut f = factory(&["--dict-list", &list, "--dict-order=reverse", "--dict-ram"]).unwrap();
    assert_eq!(tokens(f.source().unwrap().as_mut(), 3), vec!["three", "two", "one"]);
}

#[test]
fn weighted_random_choice() {
    let tmp = TmpDir::new();
    let dict = tmp.file("weights.txt");
    write_all(&dict, "never 0\nalways 5\nplain\n");

    let mut f = factory(&["--dict", &dict, "--dict-ram", "--dict-order=random"]).unwrap();
    let seen: HashSet<String> = tokens(f.source().unwrap().as_mut(), 200).into_iter().collect();
    assert!(!seen.contains("never"));
    assert!(seen.contains("always"));
    assert!(seen.contains("plain"));
}

#[test]
fn markov_chain_follows_transitions() {
    let tmp = TmpDir::new();
    let dict = tmp.file("corpus.txt");
    write_all(&dict, "one\ntwo\nthree\n");

    let mut f = factory(&["--dict", &dict, "--dict-ram", "--markov", "--ngram=2"]).unwrap();
    let words = tokens(f.source().unwrap().as_mut(), 100);
    for pair in words.windows(2) {
        assert!(pair[0] == "two" || pair[0] == "three");
        if pair[0] == "two" {
            assert_eq!(pair[1], "three");
        }
    }

    let err = factory(&["--dict", &dict, "--markov"]).err().unwrap();
    assert_eq!(err.exit_code(), 2);

    // Too few words for the model cycles the dictionary instead.
    let mut f = factory(&["--dict", &dict, "--dict-ram", "--markov", "--ngram=5"]).unwrap();
    assert_eq!(tokens(f.source().unwrap().as_mut(), 4), vec!["one", "two", "three", "one"]);
}

#[test]
fn empty_dictionary() {
    let tmp = TmpDir::new();
    let dict = tmp.file("empty.txt");
    write_all(&dict, "\n\n   \n");
    assert_eq!(
        factory(&["--dict", &dict, "--dict-ram"]).err().unwrap().exit_code(),
        2
    );

    let mut f = factory(&["--dict", &dict, "--dict-order=sequential"]).unwrap();
    let err = f.source().unwrap().next_chunk().unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn sources_per_target_are_independent() {
    let mut f = factory(&["--pump-mode=randbin", "--chunk=32"]).unwrap();
    let a = f.source().unwrap().next_chunk().unwrap();
    let b = f.source().unwrap().next_chunk().unwrap();
    assert_ne!(a, b);

    let mut g = factory(&["--pump-mode=randbin", "--chunk=32"]).unwrap();
    assert_eq!(g.source().unwrap().next_chunk().unwrap(), a);
}
