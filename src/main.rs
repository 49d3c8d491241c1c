use anyhow::Result;
use clockbuf::buffer_pool::BufferPoolManager;
use clockbuf::file::DiskFile;

fn main() -> Result<()> {
    let file = DiskFile::open("data/demo")?;
    let mut bpm = BufferPoolManager::new(8);

    let (page_no, page) = bpm.alloc_page(&file)?;
    page.write_bytes(0, b"hello, clockbuf");
    bpm.unpin_page(&file, page_no, true)?;

    bpm.flush_file(&file)?;

    let page = bpm.read_page(&file, page_no)?;
    println!("page {page_no}: {:?}", page.read_bytes(0, 15));
    bpm.unpin_page(&file, page_no, false)?;

    bpm.print_self();

    Ok(())
}
