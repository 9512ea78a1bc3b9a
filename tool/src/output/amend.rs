//! Reports the progress of an amendment.

use std::path::Path;

use pgp_amend::amend;
use pgp_amend::amend::output::Probe;
use pgp_amend::amend::output::Warning;

use crate::Result;
use crate::app::PgpAmend;

pub struct Stream<'a> {
    app: &'a PgpAmend,
    file: &'a Path,
}

impl<'a> Stream<'a> {
    pub fn new(app: &'a PgpAmend, file: &'a Path) -> Self {
        Self {
            app,
            file,
        }
    }
}

impl amend::Stream for Stream<'_> {
    fn output(&mut self,
              params: &amend::Params,
              output: amend::Output)
        -> Result<()>
    {
        make_qprintln!(self.app.quiet());
        let verbose = self.app.verbose();

        match output {
            amend::Output::Probed(Probe::NoSignature) => {
                if verbose {
                    weprintln!("{} is not signed, clearsigning it using {}.",
                               self.file.display(), params.default_hash());
                }
            }

            amend::Output::Probed(Probe::HasSignature { signatures }) => {
                if verbose {
                    weprintln!("{} has {} valid signature{}.",
                               self.file.display(), signatures,
                               if signatures == 1 { "" } else { "s" });
                }
            }

            amend::Output::Warning(warning) => {
                let msg = match warning {
                    Warning::UnsupportedHashAlgorithm(name) => format!(
                        "The document declares the digest algorithm {}, \
                         which is not one of MD5, SHA1, SHA256, or SHA512.  \
                         Signing with it anyway.", name),
                    Warning::DefaultHashAlgorithm =>
                        "The document does not declare a digest algorithm, \
                         assuming MD5.".to_string(),
                    Warning::MultipleHashAlgorithms(names) => format!(
                        "The document declares several digest algorithms \
                         ({}), using {}.",
                        names.join(", "),
                        names.first().map(String::as_str).unwrap_or("MD5")),
                    Warning::BodyDiffers =>
                        "The new signature was made over a differently \
                         encoded text.  Keeping the original text.".to_string(),
                    _ => return Ok(()),
                };
                qprintln!(initial_indent = "Warning: ", "{}", msg);
            }

            amend::Output::Merged { existing, added } => {
                if verbose {
                    weprintln!("Merging {} existing and {} new signature \
                                packet{}.",
                               existing, added,
                               if added == 1 { "" } else { "s" });
                }
            }

            amend::Output::Verified(tally) => {
                qprintln!("{} verified: {} good signature{}.",
                          self.file.display(), tally.good,
                          if tally.good == 1 { "" } else { "s" });
                if verbose {
                    for signer in tally.signers.iter() {
                        weprintln!(initial_indent = "  - ", "signed by {}",
                                   signer);
                    }
                }
            }

            _ => (),
        }

        Ok(())
    }
}
