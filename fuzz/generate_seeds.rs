//! Generate seed corpus for fuzzing

use binstapler::{staple_files, StapleConfig};
use std::fs;
use std::path::Path;

fn staple_seed(
    work: &Path,
    corpus_dir: &str,
    name: &str,
    files: &[(&str, &[u8])],
) -> Result<(), Box<dyn std::error::Error>> {
    let binary = work.join("binary");
    if !binary.exists() {
        fs::write(&binary, b"\x7fELF seed binary")?;
    }

    let root = work.join(name);
    fs::create_dir_all(&root)?;
    for (path, contents) in files {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, contents)?;
    }

    let output = format!("{}/seed_{}.bin", corpus_dir, name);
    let _ = fs::remove_file(&output);
    staple_files(&StapleConfig::new(&binary, &output, [name]).with_base_dir(work))?;
    println!("✓ Generated: {}", output);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let corpus_dir = "fuzz/corpus/fuzz_stapled_parse";
    fs::create_dir_all(corpus_dir)?;
    let work = tempfile::tempdir()?;

    println!("Generating seed corpus...");

    staple_seed(work.path(), corpus_dir, "single", &[("test.txt", &b"Hello, World!"[..])])?;
    staple_seed(
        work.path(),
        corpus_dir,
        "nested",
        &[
            ("file1.txt", &b"First file"[..]),
            ("file2.txt", &b"Second file"[..]),
            ("dir/file3.txt", &b"Third file in directory"[..]),
        ],
    )?;
    let binary_data: Vec<u8> = (0..255).collect();
    staple_seed(work.path(), corpus_dir, "binary", &[("binary.bin", &binary_data[..])])?;
    staple_seed(work.path(), corpus_dir, "zero_length", &[("empty.txt", &b""[..])])?;

    println!("\nGenerated 4 seed files in {}", corpus_dir);
    Ok(())
}
