use super::{FilesOutput, RankOutput, StatusOutput, SummaryOutput, SyncOutput};
use crate::context::{ContextBundle, ContextFile};
use crate::error::ErrorReport;
use crate::summary::StructureSummary;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::error::Error;
use std::io::Cursor;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

pub fn render_files(data: &FilesOutput) -> Result<String, Box<dyn Error>> {
    document(|writer| {
        write_element(writer, "project", &data.project)?;
        open(writer, "files")?;
        for file in &data.files {
            let mut elem = BytesStart::new("file");
            elem.push_attribute(("path", file.path.as_str()));
            elem.push_attribute(("size", file.size.to_string().as_str()));
            writer.write_event(Event::Empty(elem))?;
        }
        close(writer, "files")
    })
}

pub fn render_ranking(data: &RankOutput) -> Result<String, Box<dyn Error>> {
    document(|writer| {
        write_element(writer, "project", &data.project)?;
        write_element(writer, "query", &data.query)?;
        write_keywords(writer, &data.keywords)?;
        open(writer, "files")?;
        for file in &data.files {
            let mut elem = BytesStart::new("file");
            elem.push_attribute(("path", file.path.as_str()));
            elem.push_attribute(("score", file.score.to_string().as_str()));
            elem.push_attribute(("reason", file.reason.as_str()));
            writer.write_event(Event::Empty(elem))?;
        }
        close(writer, "files")
    })
}

pub fn render_summary(data: &SummaryOutput) -> Result<String, Box<dyn Error>> {
    document(|writer| {
        write_element(writer, "project", &data.project)?;
        write_structure(writer, &data.summary)
    })
}

pub fn render_bundle(bundle: &ContextBundle) -> Result<String, Box<dyn Error>> {
    document(|writer| {
        write_element(writer, "project", &bundle.project)?;
        write_element(writer, "query", &bundle.query)?;
        write_element(writer, "mirror", &bundle.mirror.display().to_string())?;
        if let Some(action) = bundle.action {
            write_element(writer, "action", &action.to_string())?;
        }
        write_keywords(writer, &bundle.keywords)?;
        write_element(writer, "files_shown", &bundle.files.len().to_string())?;
        write_element(writer, "skipped", &bundle.skipped.to_string())?;
        write_element(writer, "truncated", &bundle.truncated.to_string())?;
        write_element(writer, "total_lines", &bundle.total_lines().to_string())?;
        write_structure(writer, &bundle.summary)?;

        open(writer, "files")?;
        for file in &bundle.files {
            write_context_file(writer, file)?;
        }
        close(writer, "files")
    })
}

pub fn render_sync(data: &SyncOutput) -> Result<String, Box<dyn Error>> {
    document(|writer| {
        open(writer, "repositories")?;
        for entry in &data.repositories {
            let mut elem = BytesStart::new("repository");
            elem.push_attribute(("project", entry.project.as_str()));
            if let Some(action) = entry.action {
                elem.push_attribute(("action", action.to_string().as_str()));
            }
            if let Some(path) = &entry.path {
                elem.push_attribute(("path", path.display().to_string().as_str()));
            }

            if entry.warning.is_none() && entry.error.is_none() {
                writer.write_event(Event::Empty(elem))?;
                continue;
            }
            writer.write_event(Event::Start(elem.borrow()))?;
            if let Some(warning) = &entry.warning {
                write_element(writer, "warning", warning)?;
            }
            if let Some(error) = &entry.error {
                write_error(writer, error)?;
            }
            close(writer, "repository")?;
        }
        close(writer, "repositories")
    })
}

pub fn render_status(data: &StatusOutput) -> Result<String, Box<dyn Error>> {
    document(|writer| {
        write_element(writer, "base_path", &data.base_path.display().to_string())?;
        open(writer, "mirrors")?;
        for mirror in &data.mirrors {
            let mut elem = BytesStart::new("mirror");
            elem.push_attribute(("name", mirror.name.as_str()));
            elem.push_attribute(("path", mirror.path.display().to_string().as_str()));
            if let Some(kind) = mirror.kind {
                elem.push_attribute(("kind", kind.to_string().as_str()));
            }
            writer.write_event(Event::Empty(elem))?;
        }
        close(writer, "mirrors")
    })
}

pub fn render_error(report: &ErrorReport) -> Result<String, Box<dyn Error>> {
    document(|writer| write_error(writer, report))
}

fn document<F>(body: F) -> Result<String, Box<dyn Error>>
where
    F: FnOnce(&mut XmlWriter) -> Result<(), Box<dyn Error>>,
{
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    open(&mut writer, "context")?;
    body(&mut writer)?;
    close(&mut writer, "context")?;

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

fn write_structure(
    writer: &mut XmlWriter,
    summary: &StructureSummary,
) -> Result<(), Box<dyn Error>> {
    let mut elem = BytesStart::new("structure");
    elem.push_attribute(("files", summary.total_files.to_string().as_str()));
    elem.push_attribute(("bytes", summary.total_bytes.to_string().as_str()));
    elem.push_attribute(("directories", summary.directories.to_string().as_str()));
    writer.write_event(Event::Start(elem.borrow()))?;

    for group in &summary.extensions {
        let mut ext = BytesStart::new("extension");
        ext.push_attribute(("name", group.extension.as_str()));
        ext.push_attribute(("count", group.count.to_string().as_str()));
        ext.push_attribute(("bytes", group.bytes.to_string().as_str()));
        if group.omitted > 0 {
            ext.push_attribute(("omitted", group.omitted.to_string().as_str()));
        }
        writer.write_event(Event::Start(ext.borrow()))?;
        for path in &group.files {
            write_element(writer, "path", path)?;
        }
        close(writer, "extension")?;
    }

    close(writer, "structure")
}

fn write_context_file(writer: &mut XmlWriter, file: &ContextFile) -> Result<(), Box<dyn Error>> {
    let mut elem = BytesStart::new("file");
    elem.push_attribute(("path", file.path.as_str()));
    elem.push_attribute(("score", file.score.to_string().as_str()));
    elem.push_attribute(("lines", file.lines.to_string().as_str()));
    if let Some(tokens) = file.tokens {
        elem.push_attribute(("tokens", tokens.to_string().as_str()));
    }
    elem.push_attribute(("hash", file.hash.as_str()));
    writer.write_event(Event::Start(elem.borrow()))?;

    open(writer, "content")?;
    writer.write_event(Event::CData(BytesCData::new(file.content.as_str())))?;
    close(writer, "content")?;

    close(writer, "file")
}

fn write_keywords(writer: &mut XmlWriter, keywords: &[String]) -> Result<(), Box<dyn Error>> {
    open(writer, "keywords")?;
    for keyword in keywords {
        write_element(writer, "keyword", keyword)?;
    }
    close(writer, "keywords")
}

fn write_error(writer: &mut XmlWriter, report: &ErrorReport) -> Result<(), Box<dyn Error>> {
    let mut elem = BytesStart::new("error");
    elem.push_attribute(("kind", report.kind.as_str()));
    writer.write_event(Event::Start(elem.borrow()))?;
    writer.write_event(Event::Text(BytesText::new(&report.detail)))?;
    close(writer, "error")
}

fn write_element(writer: &mut XmlWriter, name: &str, content: &str) -> Result<(), Box<dyn Error>> {
    open(writer, name)?;
    writer.write_event(Event::Text(BytesText::new(content)))?;
    close(writer, name)
}

fn open(writer: &mut XmlWriter, name: &str) -> Result<(), Box<dyn Error>> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn close(writer: &mut XmlWriter, name: &str) -> Result<(), Box<dyn Error>> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
