//! PDF document loader using pdf-extract
//!
//! Extracts text from PDF files one page at a time, so every block keeps
//! the page number it was printed on.

use std::path::Path;

use crate::{read_file, DocumentLoader, FileType, LoadedDocument, ParserError, Result};

/// PDF document loader
pub struct PdfLoader;

impl PdfLoader {
    /// Extract the text of each page from in-memory PDF bytes
    pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>> {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| ParserError::PdfError(e.to_string()))
    }
}

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<LoadedDocument> {
        let bytes = read_file(path)?;
        if !bytes.starts_with(b"%PDF") {
            return Err(ParserError::PdfError(format!(
                "{} does not look like a PDF file",
                path.display()
            )));
        }

        let pages = Self::extract_pages(&bytes)?;
        let doc = LoadedDocument::from_pages(path.display().to_string(), FileType::Pdf, pages);

        if doc.pages.is_empty() {
            tracing::warn!(path = %path.display(), "PDF contains no extractable text");
        }

        Ok(doc)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Pdf]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Minimal PDF with one Helvetica text line per page
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let kids: Vec<String> = (0..pages.len())
            .map(|i| format!("{} 0 R", 4 + 2 * i))
            .collect();

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                pages.len()
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];
        for (i, text) in pages.iter().enumerate() {
            let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                5 + 2 * i
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{content}\nendstream",
                content.len()
            ));
        }

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, object) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{object}\nendobj\n", i + 1).as_bytes());
        }

        let xref = out.len();
        out.extend_from_slice(
            format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes(),
        );
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );
        out
    }

    #[test]
    fn test_load_keeps_page_numbers() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(&build_pdf(&[
            "Hypertension is high blood pressure.",
            "Anemia is a lack of red blood cells.",
        ]))
        .unwrap();

        let doc = PdfLoader.load(file.path()).unwrap();
        assert_eq!(doc.file_type, FileType::Pdf);
        assert_eq!(doc.pages.len(), 2);

        assert_eq!(doc.pages[0].page, 1);
        assert!(doc.pages[0].text.contains("Hypertension"));
        assert!(!doc.pages[0].text.contains("Anemia"));

        assert_eq!(doc.pages[1].page, 2);
        assert!(doc.pages[1].text.contains("Anemia"));
        assert!(!doc.pages[1].text.contains("Hypertension"));
    }

    #[test]
    fn test_blank_pdf_page_keeps_numbering() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(&build_pdf(&["Preface", "", "Index of diseases"]))
            .unwrap();

        let doc = PdfLoader.load(file.path()).unwrap();
        let numbers: Vec<u32> = doc.pages.iter().map(|p| p.page).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn test_supported_types() {
        assert!(PdfLoader.can_load(FileType::Pdf));
        assert!(!PdfLoader.can_load(FileType::PlainText));
    }

    #[test]
    fn test_rejects_non_pdf_bytes() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        write!(file, "just some text pretending to be a pdf").unwrap();

        let err = PdfLoader.load(file.path()).unwrap_err();
        assert!(matches!(err, ParserError::PdfError(_)));
    }

    #[test]
    fn test_missing_pdf() {
        let err = PdfLoader
            .load(Path::new("/nonexistent/Medical_book.pdf"))
            .unwrap_err();
        assert!(matches!(err, ParserError::NotFound(_)));
    }
}
