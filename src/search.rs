//! BM25 full-text index stored in three sled trees.
//!
//! * `tokens`: token -> number of documents containing it (u32) ++ token id (u64).
//!   The empty token is present in every document and therefore counts documents.
//! * `frequency`: token id ++ document key -> occurrences of the token in the document.
//! * `doclen`: document key -> number of tokens in the document. The empty key
//!   holds the sum over all documents.
//!
//! Mutations happen through [`IndexTx`] so that the caller can update the
//! index in the same transaction as the documents themselves.

use sled::transaction::{ConflictableTransactionResult, TransactionalTree};
use std::collections::HashMap;
use unic_ucd_category::GeneralCategory;

const K1: f32 = 1.2;
const B: f32 = 0.75;

pub fn tokens_iter(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c| !is_token_character(c))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

pub fn is_token_character(c: char) -> bool {
    let category = GeneralCategory::of(c);
    category.is_number() || category.is_letter() || category == GeneralCategory::PrivateUse
}

fn token_counts(s: &str) -> (HashMap<String, u32>, u32) {
    let mut counts = HashMap::new();
    let mut total = 0u32;
    for token in tokens_iter(s) {
        *counts.entry(token).or_insert(0) += 1;
        total += 1;
    }
    (counts, total)
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn token_entry(doc_count: u32, id: &[u8]) -> Vec<u8> {
    let mut entry = doc_count.to_le_bytes().to_vec();
    entry.extend_from_slice(id);
    entry
}

fn frequency_key(token_id: &[u8], key: &[u8]) -> Vec<u8> {
    let mut frequency_key = token_id.to_vec();
    frequency_key.extend_from_slice(key);
    frequency_key
}

const TOTAL_KEY: &[u8] = &[];

const FREQUENCY_POSTFIX: &[u8] = b"_frequency";
const TOKENS_POSTFIX: &[u8] = b"_tokens";
const DOCLEN_POSTFIX: &[u8] = b"_doclen";

pub struct SearchTrees {
    pub frequency: sled::Tree,
    pub tokens: sled::Tree,
    pub doclen: sled::Tree,
}

pub trait SearchExt {
    fn open_search<V: AsRef<[u8]>>(&self, name: V) -> sled::Result<SearchTrees>;
}

impl SearchExt for sled::Db {
    fn open_search<V: AsRef<[u8]>>(&self, name: V) -> sled::Result<SearchTrees> {
        let open = |postfix: &[u8]| {
            let mut tree_name = name.as_ref().to_vec();
            tree_name.extend_from_slice(postfix);
            self.open_tree(tree_name)
        };
        Ok(SearchTrees {
            frequency: open(FREQUENCY_POSTFIX)?,
            tokens: open(TOKENS_POSTFIX)?,
            doclen: open(DOCLEN_POSTFIX)?,
        })
    }
}

/// The index trees as seen from inside a transaction.
pub struct IndexTx<'a> {
    pub frequency: &'a TransactionalTree,
    pub tokens: &'a TransactionalTree,
    pub doclen: &'a TransactionalTree,
}

impl IndexTx<'_> {
    pub fn insert<E>(&self, key: &[u8], text: &str) -> ConflictableTransactionResult<(), E> {
        let (mut counts, total) = token_counts(text);
        counts.insert(String::new(), 1);

        if self.doclen.insert(key, &total.to_le_bytes()[..])?.is_some() {
            return Err(sled::Error::Unsupported("document is already indexed".to_owned()).into());
        }
        let total_dl = self.doclen.get(TOTAL_KEY)?.map(|dl| le_u32(&dl)).unwrap_or(0);
        self.doclen
            .insert(TOTAL_KEY, &(total_dl + total).to_le_bytes()[..])?;

        for (token, count) in counts.iter() {
            let (id, doc_count) = match self.tokens.get(token.as_bytes())? {
                Some(entry) => (entry[4..12].to_vec(), le_u32(&entry)),
                None => (self.tokens.generate_id()?.to_le_bytes().to_vec(), 0),
            };
            self.frequency
                .insert(frequency_key(&id, key), &count.to_le_bytes()[..])?;
            self.tokens
                .insert(token.as_bytes(), token_entry(doc_count + 1, &id))?;
        }
        Ok(())
    }

    /// Removes a document. `text` must be the text it was inserted with.
    pub fn remove<E>(&self, key: &[u8], text: &str) -> ConflictableTransactionResult<(), E> {
        let (mut counts, total) = token_counts(text);
        counts.insert(String::new(), 1);

        let mismatch =
            || sled::Error::Unsupported("text does not match indexed document".to_owned());

        match self.doclen.remove(key)? {
            Some(old_total) if le_u32(&old_total) == total => {}
            _ => return Err(mismatch().into()),
        }
        let total_dl = self.doclen.get(TOTAL_KEY)?.map(|dl| le_u32(&dl)).unwrap_or(0);
        self.doclen
            .insert(TOTAL_KEY, &total_dl.saturating_sub(total).to_le_bytes()[..])?;

        for token in counts.keys() {
            let entry = self.tokens.get(token.as_bytes())?.ok_or_else(mismatch)?;
            let id = &entry[4..12];
            if self.frequency.remove(frequency_key(id, key))?.is_none() {
                return Err(mismatch().into());
            }
            match le_u32(&entry) {
                0 | 1 => {
                    self.tokens.remove(token.as_bytes())?;
                }
                doc_count => {
                    self.tokens
                        .insert(token.as_bytes(), token_entry(doc_count - 1, id))?;
                }
            }
        }
        Ok(())
    }
}

impl SearchTrees {
    /// BM25 score of every document matching at least one token of `text`.
    pub fn query(&self, text: &str) -> sled::Result<HashMap<sled::IVec, f32>> {
        let (counts, _) = token_counts(text);
        let mut ret = HashMap::new();

        let num_documents = self
            .tokens
            .get("")?
            .map(|entry| le_u32(&entry))
            .unwrap_or(0);
        if num_documents == 0 {
            return Ok(ret);
        }
        let total_dl = self.doclen.get(TOTAL_KEY)?.map(|dl| le_u32(&dl)).unwrap_or(0);
        let avgdl = (total_dl as f32 / num_documents as f32).max(f32::EPSILON);

        for (token, count) in counts {
            let entry = match self.tokens.get(token.as_bytes())? {
                Some(entry) => entry,
                None => continue,
            };
            let doc_count = le_u32(&entry) as f32;
            let idf = ((num_documents as f32 - doc_count + 0.5) / (doc_count + 0.5) + 1.0).ln();
            for row in self.frequency.scan_prefix(&entry[4..12]) {
                let (id_and_key, frequency) = row?;
                let frequency = le_u32(&frequency) as f32;
                let key = sled::IVec::from(&id_and_key[8..]);
                let dl = self.doclen.get(&key)?.map(|dl| le_u32(&dl)).unwrap_or(0) as f32;
                let bm25 = idf * frequency * (K1 + 1.0)
                    / (frequency + K1 * (1.0 - B + B * dl / avgdl));
                *ret.entry(key).or_insert(0.0) += bm25 * count as f32;
            }
        }

        Ok(ret)
    }

    #[cfg(test)]
    pub fn clear(&self) -> sled::Result<()> {
        self.frequency.clear()?;
        self.tokens.clear()?;
        self.doclen.clear()
    }
}
