//! Sofa, document text and annotation helpers.

use std::collections::HashSet;

use super::Cas;
use crate::error::CasError;
use crate::heap::Addr;
use crate::types::{names, TypeCode};

impl Cas {
    /// The Sofa of the initial view, if one exists.
    pub fn sofa(&self) -> Option<Addr> {
        self.sofa
    }

    /// Returns the initial Sofa, creating it on first use.
    pub(crate) fn ensure_sofa(&mut self) -> Result<Addr, CasError> {
        if let Some(sofa) = self.sofa {
            return Ok(sofa);
        }
        let b = self.ts.builtins().clone();
        let sofa = self.alloc_record(b.sofa)?;
        self.set_int(sofa, b.sofa_num, 1)?;
        self.set_string(sofa, b.sofa_id, Some(names::INITIAL_VIEW))?;
        self.sofa = Some(sofa);
        Ok(sofa)
    }

    /// Sets the subject-of-analysis text.
    ///
    /// An existing document annotation is stretched to the new text length.
    pub fn set_document_text(&mut self, text: &str) -> Result<(), CasError> {
        let sofa = self.ensure_sofa()?;
        let b = self.ts.builtins().clone();
        self.set_string(sofa, b.sofa_string, Some(text))?;
        if let Some(doc) = self.find_document_annotation() {
            // End is a key of the annotation index.
            self.remove_fs(doc)?;
            self.set_int(doc, b.end, span_offset(text.len())?)?;
            self.add_fs(doc)?;
        }
        Ok(())
    }

    pub fn document_text(&self) -> Option<&str> {
        let sofa = self.sofa?;
        self.get_string(sofa, self.ts.builtins().sofa_string)
            .ok()
            .flatten()
    }

    pub fn set_sofa_mime_type(&mut self, mime_type: &str) -> Result<(), CasError> {
        let sofa = self.ensure_sofa()?;
        let f = self.ts.builtins().sofa_mime;
        self.set_string(sofa, f, Some(mime_type))
    }

    pub fn sofa_mime_type(&self) -> Option<&str> {
        let sofa = self.sofa?;
        self.get_string(sofa, self.ts.builtins().sofa_mime)
            .ok()
            .flatten()
    }

    /// Creates an annotation of type `t` over `[begin, end)` in the initial view.
    ///
    /// The annotation is not indexed; call [`Cas::add_fs`].
    pub fn create_annotation(&mut self, t: TypeCode, begin: i32, end: i32) -> Result<Addr, CasError> {
        let b = self.ts.builtins().clone();
        if !self.ts.is_subtype(t, b.annotation) {
            return Err(CasError::TypeNotCreatable {
                type_name: self.ts.type_name(t).to_string(),
                reason: "not an annotation type",
            });
        }
        let sofa = self.ensure_sofa()?;
        let addr = self.create(t)?;
        self.set_ref(addr, b.sofa_ref, Some(sofa))?;
        self.set_int(addr, b.begin, begin)?;
        self.set_int(addr, b.end, end)?;
        Ok(addr)
    }

    /// Begin and end of an annotation.
    pub fn span(&self, addr: Addr) -> Result<(i32, i32), CasError> {
        let b = self.ts.builtins();
        Ok((self.get_int(addr, b.begin)?, self.get_int(addr, b.end)?))
    }

    /// Text covered by an annotation.
    ///
    /// Offsets are byte offsets into the document text. Returns `None` when
    /// there is no text or the span does not denote a valid slice of it.
    pub fn covered_text(&self, addr: Addr) -> Result<Option<&str>, CasError> {
        let (begin, end) = self.span(addr)?;
        let Some(text) = self.document_text() else {
            return Ok(None);
        };
        if begin < 0 || end < begin {
            return Ok(None);
        }
        Ok(text.get(begin as usize..end as usize))
    }

    fn find_document_annotation(&self) -> Option<Addr> {
        let t = self.ts.builtins().document_annotation;
        self.all_indexed_fs(t)
            .find(|addr| self.type_of(*addr).is_ok_and(|found| found == t))
    }

    /// Returns the document annotation, creating and indexing it on first use.
    ///
    /// It spans the whole document text.
    pub fn document_annotation(&mut self) -> Result<Addr, CasError> {
        if let Some(doc) = self.find_document_annotation() {
            return Ok(doc);
        }
        let b = self.ts.builtins().clone();
        let end = span_offset(self.document_text().map(str::len).unwrap_or(0))?;
        let doc = self.create_annotation(b.document_annotation, 0, end)?;
        self.add_fs(doc)?;
        Ok(doc)
    }

    pub fn set_document_language(&mut self, language: &str) -> Result<(), CasError> {
        let doc = self.document_annotation()?;
        let f = self.ts.builtins().language;
        self.set_string(doc, f, Some(language))
    }

    pub fn document_language(&self) -> Option<&str> {
        let doc = self.find_document_annotation()?;
        self.get_string(doc, self.ts.builtins().language)
            .ok()
            .flatten()
    }

    /// Indexed annotations of type `t` lying within the span of `addr`.
    ///
    /// Results follow annotation index order; `addr` itself is excluded.
    pub fn select_covered(&self, t: TypeCode, addr: Addr) -> Result<Vec<Addr>, CasError> {
        let (begin, end) = self.span(addr)?;
        let index = self.index_for_type(names::ANNOTATION_INDEX, t)?;
        let mut it = index.iter();
        it.move_to(addr);
        if !it.is_valid() {
            it.move_to_last();
        }
        // move_to lands after longer spans starting at the same offset; back up over them.
        loop {
            let mut prev = it.copy();
            prev.move_to_previous();
            match prev.get() {
                Ok(p) if self.span(p)?.0 >= begin => it = prev,
                _ => break,
            }
        }
        let mut covered = Vec::new();
        for member in it {
            let (b, e) = self.span(member)?;
            if b > end {
                break;
            }
            if b >= begin && e <= end && member != addr {
                covered.push(member);
            }
        }
        Ok(covered)
    }

    /// Indexed annotations of type `t` whose span contains the span of `addr`.
    ///
    /// Results follow annotation index order; `addr` itself is excluded.
    pub fn select_covering(&self, t: TypeCode, addr: Addr) -> Result<Vec<Addr>, CasError> {
        let (begin, end) = self.span(addr)?;
        let index = self.index_for_type(names::ANNOTATION_INDEX, t)?;
        let mut covering = Vec::new();
        for member in index.iter() {
            let (b, e) = self.span(member)?;
            if b > begin {
                break;
            }
            if e >= end && member != addr {
                covering.push(member);
            }
        }
        Ok(covering)
    }

    /// Builds an FS list holding `items` in order.
    pub fn create_fs_list(&mut self, items: &[Addr]) -> Result<Addr, CasError> {
        let b = self.ts.builtins().clone();
        let mut list = self.create(b.empty_fs_list)?;
        for item in items.iter().rev() {
            let node = self.create(b.non_empty_fs_list)?;
            self.set_ref(node, b.fs_list_head, Some(*item))?;
            self.set_ref(node, b.fs_list_tail, Some(list))?;
            list = node;
        }
        Ok(list)
    }

    /// Collects the heads of an FS list.
    ///
    /// Stops at the empty list, a null tail, or a node already visited, so
    /// cyclic lists terminate. Null heads are skipped.
    pub fn fs_list_to_vec(&self, list: Addr) -> Result<Vec<Addr>, CasError> {
        let b = self.ts.builtins();
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(list);
        while let Some(node) = current {
            if !visited.insert(node) || self.type_of(node)? != b.non_empty_fs_list {
                break;
            }
            if let Some(head) = self.get_ref(node, b.fs_list_head)? {
                items.push(head);
            }
            current = self.get_ref(node, b.fs_list_tail)?;
        }
        Ok(items)
    }
}

fn span_offset(len: usize) -> Result<i32, CasError> {
    i32::try_from(len).map_err(|_| CasError::Capacity {
        index: len,
        length: i32::MAX as usize,
    })
}
