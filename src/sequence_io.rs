//src/sequence_io.rs

use ahash::AHashSet;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::error::RecordError;
use crate::types::{RejectedRecord, SequenceRecord};

/// Records parsed from one input, plus the ones that had to be dropped.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedBatch {
    pub records: Vec<SequenceRecord>,
    pub rejected: Vec<RejectedRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// `id<TAB>sequence`, one record per line.
    Tabular,
    Fasta,
}

impl InputFormat {
    /// Guesses the format from the file name; `.gz` is looked through.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let name = path
            .as_ref()
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        if [".fa", ".fasta", ".fna", ".ffn"].iter().any(|ext| name.ends_with(ext)) {
            InputFormat::Fasta
        } else {
            InputFormat::Tabular
        }
    }
}

/// Collects records in input order, rejecting duplicates of an identifier
/// already seen (the first occurrence wins).
///
/// Every entry point goes through `push`, so the same record is kept or
/// dropped whatever format it came in. An empty sequence is kept; the
/// zero-row policy decides its fate later.
struct BatchBuilder {
    batch: ParsedBatch,
    seen: AHashSet<String>,
    rna_to_dna: bool,
}

impl BatchBuilder {
    fn new(rna_to_dna: bool) -> Self {
        Self {
            batch: ParsedBatch::default(),
            seen: AHashSet::new(),
            rna_to_dna,
        }
    }

    fn reject(&mut self, line: Option<usize>, id: Option<String>, reason: RecordError) {
        log::warn!(
            "Skipping record{}{}: {}",
            line.map(|l| format!(" at line {l}")).unwrap_or_default(),
            id.as_deref().map(|i| format!(" ({i})")).unwrap_or_default(),
            reason
        );
        self.batch.rejected.push(RejectedRecord { line, id, reason });
    }

    fn push(&mut self, line: Option<usize>, id: &str, sequence: &str) {
        let id = id.trim();
        if id.is_empty() {
            self.reject(line, None, RecordError::MissingIdentifier);
            return;
        }
        if !self.seen.insert(id.to_string()) {
            self.reject(
                line,
                Some(id.to_string()),
                RecordError::DuplicateIdentifier(id.to_string()),
            );
            return;
        }
        let sequence = normalize_sequence(sequence, self.rna_to_dna);
        self.batch.records.push(SequenceRecord::new(id, sequence));
    }

    fn finish(self) -> ParsedBatch {
        log::info!(
            "Parsed {} sequence records ({} rejected)",
            self.batch.records.len(),
            self.batch.rejected.len()
        );
        self.batch
    }
}

/// Uppercases; with `rna_to_dna`, `U` becomes `T`. Nothing is removed, so
/// characters outside the alphabet stay in place and are never counted.
pub fn normalize_sequence(sequence: &str, rna_to_dna: bool) -> String {
    sequence
        .chars()
        .map(|c| {
            let c = c.to_ascii_uppercase();
            if rna_to_dna && c == 'U' {
                'T'
            } else {
                c
            }
        })
        .collect()
}

/// Builds a batch from in-memory `(identifier, sequence)` pairs. Sequences
/// are uppercased but otherwise taken as given.
pub fn records_from_pairs<I, S, T>(pairs: I, rna_to_dna: bool) -> ParsedBatch
where
    I: IntoIterator<Item = (S, T)>,
    S: AsRef<str>,
    T: AsRef<str>,
{
    let mut builder = BatchBuilder::new(rna_to_dna);
    for (id, seq) in pairs {
        builder.push(None, id.as_ref(), seq.as_ref());
    }
    builder.finish()
}

/// Parses `id<TAB>sequence` lines. Blank lines are skipped and columns past
/// the second are ignored.
pub fn parse_tabular<R: BufRead>(reader: R, rna_to_dna: bool) -> io::Result<ParsedBatch> {
    let mut builder = BatchBuilder::new(rna_to_dna);
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let id = fields.next().unwrap_or_default();
        match fields.next() {
            Some(seq) => builder.push(Some(line_no), id, seq.trim()),
            None => {
                let id = id.trim();
                let id = (!id.is_empty()).then(|| id.to_string());
                builder.reject(Some(line_no), id, RecordError::MissingSequence);
            }
        }
    }
    Ok(builder.finish())
}

/// Parses FASTA. The identifier is the first whitespace-delimited token of the
/// header; sequence lines are concatenated.
pub fn parse_fasta<R: BufRead>(reader: R, rna_to_dna: bool) -> io::Result<ParsedBatch> {
    let mut builder = BatchBuilder::new(rna_to_dna);
    // (header line number, id, sequence so far)
    let mut current: Option<(usize, String, String)> = None;
    let mut orphan_reported = false;

    let flush = |builder: &mut BatchBuilder, entry: Option<(usize, String, String)>| {
        if let Some((line_no, id, seq)) = entry {
            builder.push(Some(line_no), &id, &seq);
        }
    };

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        let line = line.trim_end();

        if let Some(header) = line.strip_prefix('>') {
            flush(&mut builder, current.take());
            let id = header.split_whitespace().next().unwrap_or_default().to_string();
            current = Some((line_no, id, String::new()));
        } else if line.trim().is_empty() {
            continue;
        } else if let Some((_, _, seq)) = current.as_mut() {
            seq.push_str(line.trim());
        } else if !orphan_reported {
            // sequence data before the first header
            builder.reject(Some(line_no), None, RecordError::MissingIdentifier);
            orphan_reported = true;
        }
    }
    flush(&mut builder, current.take());
    Ok(builder.finish())
}

/// Opens a file for line reading, decompressing it if the name ends in `.gz`.
pub fn open_reader<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let f = File::open(path)?;
    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Reads sequence records from a tabular or FASTA file (optionally gzipped).
/// Without an explicit `format` it is guessed from the file name.
pub fn read_sequence_records<P: AsRef<Path>>(
    path: P,
    format: Option<InputFormat>,
    rna_to_dna: bool,
) -> io::Result<ParsedBatch> {
    let path = path.as_ref();
    let format = format.unwrap_or_else(|| InputFormat::from_path(path));
    log::info!("Reading {:?} input from {}", format, path.display());

    let reader = open_reader(path)?;
    match format {
        InputFormat::Tabular => parse_tabular(reader, rna_to_dna),
        InputFormat::Fasta => parse_fasta(reader, rna_to_dna),
    }
}
