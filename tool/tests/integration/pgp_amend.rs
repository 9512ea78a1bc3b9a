use std::fs;

use super::common;
use super::common::verify;

const NOTES: &[u8] = b"Release 1.0\n\n- fixed the frobnicator\n";

#[test]
fn pgp_amend_stdout() {
    let env = common::PgpAmend::new();
    let alice = env.key_generate("alice");
    let notes = env.write("NOTES", NOTES);

    let mut cmd = env.command();
    cmd.arg("--signer-file").arg(&alice.key_file).arg(&notes);
    let (stdout, _) = env.run(cmd, 0);

    assert!(stdout.starts_with(b"-----BEGIN PGP SIGNED MESSAGE-----\n"));
    assert_eq!(verify(&stdout, &[&alice.cert]),
               vec![ alice.cert.fingerprint().to_hex() ]);

    // Without --replace, the file is left alone.
    assert_eq!(fs::read(&notes).unwrap(), NOTES);
}

#[test]
fn pgp_amend_replace_twice() {
    let env = common::PgpAmend::new();
    let alice = env.key_generate("alice");
    let bob = env.key_generate("bob");
    let notes = env.write("NOTES", NOTES);

    let mut cmd = env.command();
    cmd.arg("--replace")
        .arg("--signer-file").arg(&alice.key_file)
        .arg(&notes);
    env.run(cmd, 0);
    let once = fs::read(&notes).unwrap();
    assert_eq!(verify(&once, &[&alice.cert]).len(), 1);

    let mut cmd = env.command();
    cmd.arg("--replace")
        .arg("--signer-file").arg(&bob.key_file)
        .arg("--keyring").arg(&alice.cert_file)
        .arg(&notes);
    env.run(cmd, 0);
    let twice = fs::read(&notes).unwrap();

    assert_eq!(verify(&twice, &[&alice.cert, &bob.cert]), vec![
        alice.cert.fingerprint().to_hex(),
        bob.cert.fingerprint().to_hex(),
    ]);

    let text = String::from_utf8(twice).unwrap();
    assert_eq!(text.matches("-----BEGIN PGP SIGNED MESSAGE-----").count(), 1);
    assert_eq!(text.matches("-----BEGIN PGP SIGNATURE-----").count(), 1);
    assert!(text.contains("\nVersion: pgp-amend "));

    // No temporary files are left behind.
    assert!(env.files().iter().all(|f| ! f.ends_with(".part")));
}

#[test]
fn pgp_amend_verification_failure_keeps_the_original() {
    let env = common::PgpAmend::new();
    let alice = env.key_generate("alice");
    let bob = env.key_generate("bob");
    let notes = env.write("NOTES", NOTES);

    let mut cmd = env.command();
    cmd.arg("--replace")
        .arg("--signer-file").arg(&alice.key_file)
        .arg(&notes);
    env.run(cmd, 0);
    let signed = fs::read(&notes).unwrap();
    let files = env.files();

    // Bob cannot check Alice's signature.
    let mut cmd = env.command();
    cmd.arg("--replace")
        .arg("--signer-file").arg(&bob.key_file)
        .arg(&notes);
    let (stdout, stderr) = env.run(cmd, 70);

    assert!(stdout.is_empty());
    assert!(stderr.starts_with("Error: "), "{}", stderr);
    assert_eq!(fs::read(&notes).unwrap(), signed);
    assert_eq!(env.files(), files);
}

#[test]
fn pgp_amend_usage() {
    let env = common::PgpAmend::new();

    env.run(env.command(), 64);

    let mut cmd = env.command();
    cmd.args(["-v", "-q", "NOTES"]);
    env.run(cmd, 64);

    let mut cmd = env.command();
    cmd.args(["--hash", "", "NOTES"]);
    env.run(cmd, 64);

    let mut cmd = env.command();
    cmd.arg("--help");
    env.run(cmd, 0);

    let mut cmd = env.command();
    cmd.arg("--version");
    env.run(cmd, 0);
}

#[test]
fn pgp_amend_missing_input() {
    let env = common::PgpAmend::new();
    let alice = env.key_generate("alice");

    let mut cmd = env.command();
    cmd.arg("--signer-file").arg(&alice.key_file)
        .arg(env.base().join("does-not-exist"));
    let (stdout, stderr) = env.run(cmd, 66);
    assert!(stdout.is_empty());
    assert!(stderr.contains("cannot read"), "{}", stderr);

    // A missing key file is missing input, too.
    let notes = env.write("NOTES", NOTES);
    let mut cmd = env.command();
    cmd.arg("--signer-file").arg(env.base().join("nobody.pgp"))
        .arg(&notes);
    env.run(cmd, 66);
}

#[test]
fn pgp_amend_no_signer() {
    let env = common::PgpAmend::new();
    let notes = env.write("NOTES", NOTES);

    let mut cmd = env.command();
    cmd.arg(&notes);
    let (_, stderr) = env.run(cmd, 70);
    assert!(stderr.contains("sign.signer-files"), "{}", stderr);
}

#[test]
fn pgp_amend_config_file() {
    let env = common::PgpAmend::new();
    let alice = env.key_generate("alice");
    let bob = env.key_generate("bob");
    let notes = env.write("NOTES", NOTES);

    let config = env.write("alice.toml", format!("\
[sign]
signer-files = [ {:?} ]
hash = \"SHA512\"
", alice.key_file.display().to_string()).as_bytes());

    let mut cmd = env.command();
    cmd.arg("--config").arg(&config).arg("--replace").arg(&notes);
    env.run(cmd, 0);
    let signed = fs::read(&notes).unwrap();
    assert!(signed.starts_with(b"-----BEGIN PGP SIGNED MESSAGE-----\n\
                                 Hash: SHA512\n"));

    // The default configuration file.
    let dir = env.base().join("config").join("pgp-amend");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), format!("\
[ui]
verbosity = \"quiet\"

[sign]
signer-files = [ {:?} ]

[verify]
keyrings = [ {:?} ]
", bob.key_file.display().to_string(),
   alice.cert_file.display().to_string())).unwrap();

    let mut cmd = env.command();
    cmd.arg("--replace").arg(&notes);
    let (_, stderr) = env.run(cmd, 0);
    assert!(stderr.is_empty(), "{}", stderr);
    assert_eq!(verify(&fs::read(&notes).unwrap(), &[&alice.cert, &bob.cert])
               .len(), 2);
}

#[test]
fn pgp_amend_bad_config() {
    let env = common::PgpAmend::new();
    let notes = env.write("NOTES", NOTES);

    let config = env.write("bad.toml", b"[sign]\nsigner = \"alice\"\n");
    let mut cmd = env.command();
    cmd.arg("--config").arg(&config).arg(&notes);
    let (_, stderr) = env.run(cmd, 78);
    assert!(stderr.contains("unknown keys"), "{}", stderr);

    // An explicitly named configuration file must exist.
    let mut cmd = env.command();
    cmd.env("PGP_AMEND_CONFIG", env.base().join("missing.toml"))
        .arg(&notes);
    env.run(cmd, 78);
}
