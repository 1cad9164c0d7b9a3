//! Decoding of the job status byte stream

use std::pin::Pin;
use futures::Stream;
use log::trace;
use crate::error::Error;
use crate::request::JobStatusRecord;

/// Largest incomplete record held while waiting for the rest
pub const MAX_PENDING_BYTES: usize = 1 << 20;

/// Live byte stream returned by a generate call
pub type JobStream
  = Pin<Box<dyn Stream<Item = Result<Vec<u8>, Error>> + Send>>;

/// Splits byte chunks into job status records
///
/// Records are newline-delimited. A chunk carrying exactly one complete
/// record with no trailing newline is accepted as well; partial data is
/// kept until the rest arrives.
#[derive(Debug, Default)]
pub struct RecordDecoder
{   buffer: Vec<u8>
}

impl RecordDecoder
{   pub fn new() -> Self
    {   RecordDecoder::default()
    }

    /// Feed one chunk, returning every record it completes
    pub fn push(&mut self, chunk: &[u8])
      -> Result<Vec<JobStatusRecord>, Error>
    {   self.buffer.extend_from_slice(chunk);
        let mut records = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n')
        {   let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(record) = decode_line(&line)?
            {   records.push(record);
            }
        }

        if let Some(record) = self.take_complete_tail()?
        {   records.push(record);
        }

        if self.buffer.len() > MAX_PENDING_BYTES
        {   let held = self.buffer.len();
            self.buffer.clear();
            return Err(Error::Parse(format!(
              "incomplete record exceeds {} bytes ({} held)",
              MAX_PENDING_BYTES, held
            )));
        }
        Ok(records)
    }

    /// Flush whatever is left once the stream has ended
    pub fn finish(&mut self) -> Result<Option<JobStatusRecord>, Error>
    {   let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }

    /// Bytes held back waiting for more data
    pub fn pending(&self) -> usize
    {   self.buffer.len()
    }

    fn take_complete_tail(&mut self)
      -> Result<Option<JobStatusRecord>, Error>
    {   let tail = match std::str::from_utf8(&self.buffer)
        {   Ok(text) if text.trim().is_empty() => Tail::Empty
          , Ok(text) => match JobStatusRecord::from_json(text.trim())
            {   Ok(record) => Tail::Record(record)
              , Err(Error::Parse(_)) if is_incomplete(text) => Tail::Partial
              , Err(e) => Tail::Invalid(e)
            }
            // a multi-byte character may be split across chunks
          , Err(e) if e.error_len().is_none() => Tail::Partial
          , Err(e) => Tail::Invalid(Error::Parse(e.to_string()))
        };

        match tail
        {   Tail::Empty => {
              self.buffer.clear();
              Ok(None)
            }
          , Tail::Partial => {
              trace!("Holding {} bytes of partial record", self.buffer.len());
              Ok(None)
            }
          , Tail::Record(record) => {
              self.buffer.clear();
              Ok(Some(record))
            }
          , Tail::Invalid(e) => {
              self.buffer.clear();
              Err(e)
            }
        }
    }
}

enum Tail
{   Empty
  , Partial
  , Record(JobStatusRecord)
  , Invalid(Error)
}

fn is_incomplete(text: &str) -> bool
{   match serde_json::from_str::<serde_json::Value>(text)
    {   Ok(_) => false
      , Err(e) => e.is_eof()
    }
}

fn decode_line(line: &[u8]) -> Result<Option<JobStatusRecord>, Error>
{   let text = std::str::from_utf8(line)
      .map_err(|e| Error::Parse(e.to_string()))?
      .trim();
    if text.is_empty()
    {   return Ok(None);
    }
    trace!("Decoding record: {}", text);
    JobStatusRecord::from_json(text).map(Some)
}

#[cfg(test)]
mod tests
{   use super::*;

    const WAITING: &str
      = r#"{"status":"WAITING","queue_position":1,"queue_total":3}"#;
    const SUCCESS: &str
      = r#"{"status":"SUCCESS","image_url":"https://x/y.png","seed":7}"#;

    #[test]
    fn one_record_per_chunk_without_newline()
    {   let mut decoder = RecordDecoder::new();
        let records = decoder.push(WAITING.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn several_lines_in_one_chunk()
    {   let mut decoder = RecordDecoder::new();
        let chunk = format!("{}\n\n{}\n", WAITING, SUCCESS);
        let records = decoder.push(chunk.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].is_terminal());
    }

    #[test]
    fn record_split_across_chunks()
    {   let mut decoder = RecordDecoder::new();
        let (head, tail) = SUCCESS.split_at(20);
        assert!(decoder.push(head.as_bytes()).unwrap().is_empty());
        assert!(decoder.pending() > 0);
        let records = decoder.push(tail.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(decoder.finish().unwrap().is_none());
    }

    #[test]
    fn garbage_is_a_parse_error()
    {   let mut decoder = RecordDecoder::new();
        assert!(matches!(
          decoder.push(b"not json\n"),
          Err(Error::Parse(_))
        ));
    }

    #[test]
    fn oversized_partial_record_is_a_parse_error()
    {   let mut decoder = RecordDecoder::new();
        decoder.push(br#"{"status":"RUNNING","progress":""#).unwrap();
        let filler = vec![b'x'; MAX_PENDING_BYTES];
        assert!(matches!(decoder.push(&filler), Err(Error::Parse(_))));
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn truncated_record_at_end_is_a_parse_error()
    {   let mut decoder = RecordDecoder::new();
        decoder.push(br#"{"status":"RUN"#).unwrap();
        assert!(matches!(decoder.finish(), Err(Error::Parse(_))));
    }
}
