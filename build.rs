#[cfg(windows)]
fn main() {
    let mut res = winres::WindowsResource::new();
    if std::path::Path::new("icons/hdr_on.ico").exists() {
        res.set_icon("icons/hdr_on.ico");
    }
    res.set("ProductName", "HDRTray");
    res.set("FileDescription", "HDRTray - toggle the Windows \"Use HDR\" option");
    res.set("LegalCopyright", "© 2025 HDRTray Contributors");
    res.set("CompanyName", "HDRTray");

    if let Err(e) = res.compile() {
        eprintln!("Failed to compile Windows resource: {}", e);
    }
}

#[cfg(not(windows))]
fn main() {
}
