//! FASTA reading, filtering, and writing.
//!
//! Parsing is delegated to `needletail`, which handles gzip-compressed
//! input transparently. Filtering is a lazy, single-pass adaptor over
//! the parser; the consumer decides when to materialize or write.

use anyhow::{Context, Result};
use log::info;
use needletail::{parse_fastx_file, FastxReader};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Width of sequence lines in written FASTA output.
const FASTA_LINE_WIDTH: usize = 60;

/// An owned FASTA record.
///
/// `id` is the first whitespace-delimited token of the header line;
/// `desc` holds the remainder, when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

/// Reads the header allow-list: one identifier per line, trailing
/// whitespace stripped, blank lines skipped.
pub fn read_headers<P: AsRef<Path>>(path: P) -> Result<HashSet<String>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open header list {}", path.display()))?;

    let mut headers = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let id = line.trim_end();
        if !id.is_empty() {
            headers.insert(id.to_string());
        }
    }

    info!("Read {} header(s) to include", headers.len());
    Ok(headers)
}

/// Lazy filter over a FASTA stream.
///
/// Yields the records whose id is an exact member of the wanted set, in
/// source order, with no deduplication of the source. The underlying
/// reader is consumed as the iterator advances; it cannot be restarted.
/// An empty wanted set yields nothing.
pub struct FilteredSequences {
    reader: Box<dyn FastxReader>,
    wanted: HashSet<String>,
}

impl Iterator for FilteredSequences {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.reader.next()? {
                Ok(r) => r,
                Err(e) => return Some(Err(e.into())),
            };
            let header = String::from_utf8_lossy(record.id()).into_owned();
            let mut parts = header.splitn(2, char::is_whitespace);
            let id = parts.next().unwrap_or("");
            if self.wanted.contains(id) {
                return Some(Ok(FastaRecord {
                    id: id.to_string(),
                    desc: parts.next().map(|d| d.trim_end().to_string()),
                    seq: record.seq().into_owned(),
                }));
            }
        }
    }
}

/// Opens `fasta` and filters it down to the records named in `wanted`.
pub fn pull_sequences<P: AsRef<Path>>(
    fasta: P,
    wanted: HashSet<String>,
) -> Result<FilteredSequences> {
    let path = fasta.as_ref();
    let reader = parse_fastx_file(path)
        .with_context(|| format!("Failed to open FASTA file {}", path.display()))?;
    Ok(FilteredSequences { reader, wanted })
}

/// Writes records to `path` in FASTA format and returns how many were
/// written. Sequence data passes through unmodified apart from line
/// wrapping.
pub fn write_fasta<I, P>(records: I, path: P) -> Result<usize>
where
    I: IntoIterator<Item = Result<FastaRecord>>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create output FASTA {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let mut written = 0usize;
    for record in records {
        let record = record?;
        match &record.desc {
            Some(desc) => writeln!(writer, ">{} {}", record.id, desc)?,
            None => writeln!(writer, ">{}", record.id)?,
        }
        for chunk in record.seq.chunks(FASTA_LINE_WIDTH) {
            writer.write_all(chunk)?;
            writer.write_all(b"\n")?;
        }
        written += 1;
    }

    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use tempfile::tempdir;

    fn create_fasta(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    fn create_fasta_gz(path: &Path, content: &str) {
        let file = File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    fn wanted(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    const FASTA: &str = "\
>A1 Influenza A virus\nACGTACGT\n>A2\nTTTT\n>A3 another entry\nGGGGCCCC\n";

    #[test]
    fn test_pull_sequences_filters_and_preserves_order() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("seqs.fa");
        create_fasta(&file_path, FASTA);

        let records: Vec<FastaRecord> = pull_sequences(&file_path, wanted(&["A3", "A1"]))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "A1");
        assert_eq!(records[0].desc.as_deref(), Some("Influenza A virus"));
        assert_eq!(records[0].seq, b"ACGTACGT");
        assert_eq!(records[1].id, "A3");
    }

    #[test]
    fn test_pull_sequences_empty_wanted_set() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("seqs.fa");
        create_fasta(&file_path, FASTA);

        let records: Vec<FastaRecord> = pull_sequences(&file_path, HashSet::new())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_pull_sequences_keeps_source_duplicates() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("dups.fa");
        create_fasta(&file_path, ">A1\nAAAA\n>A1\nCCCC\n>A2\nGGGG\n");

        let records: Vec<FastaRecord> = pull_sequences(&file_path, wanted(&["A1"]))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq, b"AAAA");
        assert_eq!(records[1].seq, b"CCCC");
    }

    #[test]
    fn test_pull_sequences_exact_id_match_only() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("seqs.fa");
        create_fasta(&file_path, FASTA);

        // "A" is a prefix of every id but matches none of them
        let records: Vec<FastaRecord> = pull_sequences(&file_path, wanted(&["A"]))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_pull_sequences_gzipped_input() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("seqs.fa.gz");
        create_fasta_gz(&file_path, FASTA);

        let records: Vec<FastaRecord> = pull_sequences(&file_path, wanted(&["A2"]))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "A2");
        assert_eq!(records[0].desc, None);
        assert_eq!(records[0].seq, b"TTTT");
    }

    #[test]
    fn test_read_headers_strips_trailing_whitespace() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("headers.txt");
        fs::write(&file_path, "A1  \nA2\n\nA3\t\n").unwrap();

        let headers = read_headers(&file_path).unwrap();
        assert_eq!(headers, wanted(&["A1", "A2", "A3"]));
    }

    #[test]
    fn test_write_fasta_wraps_sequence_lines() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("out.fa");
        let seq: Vec<u8> = b"A".repeat(70);
        let records = vec![
            Ok(FastaRecord {
                id: "A1".to_string(),
                desc: Some("long one".to_string()),
                seq,
            }),
            Ok(FastaRecord {
                id: "A2".to_string(),
                desc: None,
                seq: b"ACGT".to_vec(),
            }),
        ];

        let written = write_fasta(records, &out_path).unwrap();
        assert_eq!(written, 2);

        let content = fs::read_to_string(&out_path).unwrap();
        let expected = format!(
            ">A1 long one\n{}\n{}\n>A2\nACGT\n",
            "A".repeat(60),
            "A".repeat(10)
        );
        assert_eq!(content, expected);
    }

    #[test]
    fn test_filter_then_write_round() {
        let dir = tempdir().unwrap();
        let in_path = dir.path().join("in.fa");
        let out_path = dir.path().join("out.fa");
        create_fasta(&in_path, FASTA);

        let filtered = pull_sequences(&in_path, wanted(&["A1", "A2"])).unwrap();
        let written = write_fasta(filtered, &out_path).unwrap();
        assert_eq!(written, 2);

        let content = fs::read_to_string(&out_path).unwrap();
        assert_eq!(content, ">A1 Influenza A virus\nACGTACGT\n>A2\nTTTT\n");
    }
}
