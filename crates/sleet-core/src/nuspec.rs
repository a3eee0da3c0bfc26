//! Reader for the `.nuspec` manifest inside a nupkg.

use std::path::Path;

use quick_xml::{events::Event, Reader};

use crate::{error::CoreError, CoreResult};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NuspecDependency {
    pub id: String,
    pub range: String,
    pub exclude: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NuspecDependencyGroup {
    pub target_framework: Option<String>,
    pub dependencies: Vec<NuspecDependency>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Nuspec {
    pub id: String,
    pub version: String,
    pub title: String,
    pub description: String,
    pub summary: String,
    pub authors: String,
    pub owners: String,
    pub tags: String,
    pub icon_url: String,
    pub license_url: String,
    pub project_url: String,
    pub require_license_acceptance: bool,
    pub release_notes: String,
    pub copyright: String,
    pub language: String,
    pub min_client_version: String,
    pub dependency_groups: Vec<NuspecDependencyGroup>,
}

impl Nuspec {
    /// Parses manifest bytes. `source` is only used in error messages.
    pub fn parse(bytes: &[u8], source: &Path) -> CoreResult<Self> {
        let invalid = |reason: String| {
            CoreError::InvalidNuspec {
                path: source.to_path_buf(),
                reason,
            }
        };

        let text = std::str::from_utf8(bytes).map_err(|err| invalid(err.to_string()))?;
        let text = text.trim_start_matches('\u{feff}');

        let mut reader = Reader::from_str(text);
        reader.trim_text(true);

        let mut nuspec = Nuspec::default();
        let mut stack: Vec<String> = Vec::new();
        let mut buffer = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(element)) => {
                    let name = local_name(element.local_name().as_ref());
                    if in_dependencies(&stack) && name == "group" {
                        nuspec.dependency_groups.push(NuspecDependencyGroup {
                            target_framework: attribute(&element, "targetFramework")
                                .map_err(invalid)?,
                            dependencies: Vec::new(),
                        });
                    }
                    if name == "metadata" {
                        if let Some(version) =
                            attribute(&element, "minClientVersion").map_err(invalid)?
                        {
                            nuspec.min_client_version = version;
                        }
                    }
                    stack.push(name);
                    buffer.clear();
                }
                Ok(Event::Empty(element)) => {
                    let name = local_name(element.local_name().as_ref());
                    match name.as_str() {
                        "dependency" if dependency_parent(&stack).is_some() => {
                            let dependency = NuspecDependency {
                                id: attribute(&element, "id")
                                    .map_err(invalid)?
                                    .unwrap_or_default(),
                                range: attribute(&element, "version")
                                    .map_err(invalid)?
                                    .unwrap_or_default(),
                                exclude: attribute(&element, "exclude").map_err(invalid)?,
                            };
                            add_dependency(&mut nuspec, &stack, dependency);
                        }
                        "group" if in_dependencies(&stack) => {
                            nuspec.dependency_groups.push(NuspecDependencyGroup {
                                target_framework: attribute(&element, "targetFramework")
                                    .map_err(invalid)?,
                                dependencies: Vec::new(),
                            });
                        }
                        _ => {}
                    }
                }
                Ok(Event::Text(text)) => {
                    let text = text.unescape().map_err(|err| invalid(err.to_string()))?;
                    buffer.push_str(&text);
                }
                Ok(Event::CData(data)) => {
                    buffer.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
                Ok(Event::End(_)) => {
                    if is_metadata_field(&stack) {
                        if let Some(field) = stack.last() {
                            nuspec.set_field(field, buffer.trim());
                        }
                    }
                    stack.pop();
                    buffer.clear();
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => return Err(invalid(err.to_string())),
            }
        }

        if nuspec.id.is_empty() {
            return Err(invalid("missing <id>".to_string()));
        }
        if nuspec.version.is_empty() {
            return Err(invalid("missing <version>".to_string()));
        }

        Ok(nuspec)
    }

    fn set_field(&mut self, field: &str, value: &str) {
        let value = value.to_string();
        match field {
            "id" => self.id = value,
            "version" => self.version = value,
            "title" => self.title = value,
            "description" => self.description = value,
            "summary" => self.summary = value,
            "authors" => self.authors = value,
            "owners" => self.owners = value,
            "tags" => self.tags = value,
            "iconUrl" => self.icon_url = value,
            "licenseUrl" => self.license_url = value,
            "projectUrl" => self.project_url = value,
            "requireLicenseAcceptance" => {
                self.require_license_acceptance = value.eq_ignore_ascii_case("true")
            }
            "releaseNotes" => self.release_notes = value,
            "copyright" => self.copyright = value,
            "language" => self.language = value,
            _ => {}
        }
    }

    /// Tags split on spaces, commas and semicolons.
    pub fn tag_list(&self) -> Vec<String> {
        split_list(&self.tags, &[' ', ',', ';'])
    }

    pub fn author_list(&self) -> Vec<String> {
        split_list(&self.authors, &[','])
    }
}

fn split_list(value: &str, separators: &[char]) -> Vec<String> {
    value
        .split(|c| separators.contains(&c))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn attribute(
    element: &quick_xml::events::BytesStart<'_>,
    name: &str,
) -> Result<Option<String>, String> {
    for attr in element.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr.unescape_value().map_err(|err| err.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// `package/metadata/<field>` with the field currently open.
fn is_metadata_field(stack: &[String]) -> bool {
    stack.len() == 3 && stack[0] == "package" && stack[1] == "metadata"
}

fn in_dependencies(stack: &[String]) -> bool {
    stack.len() == 3 && stack[1] == "metadata" && stack[2] == "dependencies"
}

fn dependency_parent(stack: &[String]) -> Option<&str> {
    match stack {
        [_, metadata, deps] if metadata == "metadata" && deps == "dependencies" => {
            Some("dependencies")
        }
        [_, metadata, deps, group]
            if metadata == "metadata" && deps == "dependencies" && group == "group" =>
        {
            Some("group")
        }
        _ => None,
    }
}

fn add_dependency(nuspec: &mut Nuspec, stack: &[String], dependency: NuspecDependency) {
    if dependency_parent(stack) == Some("group") {
        if let Some(group) = nuspec.dependency_groups.last_mut() {
            group.dependencies.push(dependency);
            return;
        }
    }

    // Dependencies without a group belong to a framework agnostic group.
    match nuspec
        .dependency_groups
        .iter_mut()
        .find(|group| group.target_framework.is_none())
    {
        Some(group) => group.dependencies.push(dependency),
        None => {
            nuspec.dependency_groups.push(NuspecDependencyGroup {
                target_framework: None,
                dependencies: vec![dependency],
            })
        }
    }
}
