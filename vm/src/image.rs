//! Program images: raw 16-bit words, loaded one page at a time.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::layout::PAGE_WORDS;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    fn decode(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        }
    }
}

pub trait ImageLoader {
    /// Length of the image in words.
    fn word_count(&mut self) -> io::Result<usize>;

    /// Copies page `page_index` of the image to the front of `target`,
    /// returning how many words were copied. The final page of an image may
    /// be short.
    fn load_page_into(&mut self, page_index: usize, target: &mut [u16]) -> io::Result<usize>;
}

/// An image file on disk. A trailing odd byte is not part of any word.
#[derive(Debug)]
pub struct FileImage {
    file: File,
    byte_order: ByteOrder,
    words: usize,
}

impl FileImage {
    pub fn open<P: AsRef<Path>>(path: P, byte_order: ByteOrder) -> io::Result<FileImage> {
        let file = File::open(path)?;
        let words = (file.metadata()?.len() / 2) as usize;

        Ok(FileImage {
            file,
            byte_order,
            words,
        })
    }
}

impl ImageLoader for FileImage {
    fn word_count(&mut self) -> io::Result<usize> {
        Ok(self.words)
    }

    fn load_page_into(&mut self, page_index: usize, target: &mut [u16]) -> io::Result<usize> {
        let first_word = page_index * PAGE_WORDS;
        let count = self
            .words
            .saturating_sub(first_word)
            .min(PAGE_WORDS)
            .min(target.len());

        self.file.seek(SeekFrom::Start((first_word * 2) as u64))?;

        let mut bytes = vec![0u8; count * 2];
        self.file.read_exact(&mut bytes)?;

        for (word, chunk) in target.iter_mut().zip(bytes.chunks_exact(2)) {
            *word = self.byte_order.decode([chunk[0], chunk[1]]);
        }

        Ok(count)
    }
}

/// An image already in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WordImage {
    words: Vec<u16>,
}

impl WordImage {
    pub fn new(words: Vec<u16>) -> Self {
        WordImage { words }
    }
}

impl From<Vec<u16>> for WordImage {
    fn from(words: Vec<u16>) -> Self {
        WordImage::new(words)
    }
}

impl From<&[u16]> for WordImage {
    fn from(words: &[u16]) -> Self {
        WordImage::new(words.to_vec())
    }
}

impl ImageLoader for WordImage {
    fn word_count(&mut self) -> io::Result<usize> {
        Ok(self.words.len())
    }

    fn load_page_into(&mut self, page_index: usize, target: &mut [u16]) -> io::Result<usize> {
        let start = (page_index * PAGE_WORDS).min(self.words.len());
        let end = (start + PAGE_WORDS.min(target.len())).min(self.words.len());
        let page = &self.words[start..end];

        target[..page.len()].copy_from_slice(page);

        Ok(page.len())
    }
}
