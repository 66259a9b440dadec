use crate::clair::VulnerabilityFinding;
use crate::whitelist::Whitelist;

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected(Vec<String>),
}

/// Checks every finding against the whitelist. A finding passes if its
/// identifier is whitelisted for all images or for this image name,
/// everything else rejects the image regardless of severity.
pub fn decide(image: &str, findings: &[VulnerabilityFinding], whitelist: &Whitelist) -> Decision {
    let image_whitelist = whitelist.for_image(image);

    let mut unapproved = Vec::new();
    for finding in findings {
        let approved = whitelist.general.contains_key(&finding.name)
            || image_whitelist.is_some_and(|entries| entries.contains_key(&finding.name));
        if !approved {
            unapproved.push(finding.name.clone());
        }
    }

    if unapproved.is_empty() {
        Decision::Approved
    } else {
        Decision::Rejected(unapproved)
    }
}
