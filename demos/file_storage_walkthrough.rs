//! File Storage Walkthrough
//!
//! This demo runs the complete file share workflow against the in-process
//! store:
//! - Creating a share and a directory
//! - Uploading, listing and downloading a file
//! - Copying the file into blob storage through a signed URL, then aborting
//! - Writing two ranges into a sparse file and listing them
//! - Removing everything again
//!
//! Run this demo with:
//! ```bash
//! RUST_LOG=fileshare=debug cargo run --example file_storage_walkthrough
//! ```
//!
//! Set STORAGE_CONNECTION_STRING to use another account; a development
//! account is used otherwise.

use bytes::Bytes;
use fileshare::{Client, ClientConfig, FileShareError};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

const SHARE: &str = "demofileshare";
const FOLDER: &str = "testfolder";
const FILE_NAME: &str = "HelloWorld.png";
const CONTAINER: &str = "democontainer";
const RANGE_FILE: &str = "testfolder/rangeops.txt";

const DEV_CONNECTION_STRING: &str =
    "DefaultEndpointsProtocol=https;AccountName=devstoreaccount;AccountKey=ZGV2LWFjY291bnQta2V5";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("File Share Rust Client - Storage Walkthrough");
    println!("{}", "=".repeat(50));

    // Step 1: Configure the client
    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        warn!(error = %e, "using the development account");
        ClientConfig::new(DEV_CONNECTION_STRING)
    });

    // Step 2: Create the client instance
    let client = match Client::new(config) {
        Ok(client) => client,
        Err(e @ FileShareError::ConnectionConfiguration(_)) => {
            error!(error = %e, "check that the connection string names an account and a base64 account key");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let result = run(&client).await;
    if let Err(e) = &result {
        if e.is_not_found() || matches!(e, FileShareError::AuthenticationFailed(_)) {
            error!(
                error = %e,
                code = e.error_code(),
                "make sure the account has the file service enabled and the connection string is correct"
            );
        }
    }

    client.close().await;
    result.map_err(Into::into)
}

async fn run(client: &Client) -> fileshare::Result<()> {
    // Example 1: Share and directory
    println!("\n1. Creating share {} and directory {}...", SHARE, FOLDER);
    client.create_share_if_not_exists(SHARE).await?;
    client.create_directory_if_not_exists(SHARE, FOLDER).await?;

    // Example 2: Upload a file
    let path = format!("{}/{}", FOLDER, FILE_NAME);
    println!("\n2. Uploading {}...", path);
    let image = Bytes::from_static(b"\x89PNG\r\n\x1a\nHello, World!");
    client.upload_buffer(SHARE, &path, image).await?;

    // Example 3: Listing
    println!("\n3. Listing the share root and {}...", FOLDER);
    for directory in ["", FOLDER] {
        for item in client.list_files_and_directories(SHARE, directory).await? {
            let kind = if item.is_file() { "file" } else { "directory" };
            println!("   - {} (type: {})", client.item_uri(SHARE, &item)?, kind);
        }
    }

    // Example 4: Download to a local folder
    let download_dir = std::env::temp_dir().join("fileshare-walkthrough");
    println!("\n4. Downloading to {}...", download_dir.display());
    client
        .download_to_file(SHARE, &path, download_dir.join(FILE_NAME))
        .await?;

    // Example 5: Copy to blob storage, then try to abort
    println!("\n5. Copying {} into container {}...", path, CONTAINER);
    client.create_container_if_not_exists(CONTAINER).await?;
    let mut source = client.file_uri(SHARE, &path)?;
    source.set_query(Some(&client.generate_file_sas(SHARE, &path)?));
    let copy_id = client.start_copy(CONTAINER, FILE_NAME, &source).await?;
    println!("   Copy started, copy id = {}", copy_id);

    if let Some(state) = client.fetch_copy_state(CONTAINER, FILE_NAME).await? {
        println!("   Copy status = {}", state.status);
    }
    match client.abort_copy(CONTAINER, FILE_NAME, &copy_id).await {
        Ok(()) => println!("   Copy aborted"),
        Err(FileShareError::CopyAlreadyCompleted(_)) => {
            println!("   Abort not performed; the copy already completed")
        }
        Err(e) => return Err(e),
    }
    client.delete_file_if_exists(SHARE, &path).await?;

    // Example 6: Ranges
    println!("\n6. Writing two ranges into {}...", RANGE_FILE);
    client.create_file(SHARE, RANGE_FILE, 65536).await?;
    client
        .write_range(SHARE, RANGE_FILE, 0, Bytes::from(vec![b'a'; 512]))
        .await?;
    client
        .write_range(SHARE, RANGE_FILE, 1512, Bytes::from(vec![b'b'; 512]))
        .await?;
    for range in client.list_ranges(SHARE, RANGE_FILE).await? {
        println!(
            "   --> range start_offset = {}, end_offset = {}",
            range.start_offset, range.end_offset
        );
    }

    // Example 7: Cleanup
    println!("\n7. Removing files, directories, share, blobs and container...");
    client.delete_file_if_exists(SHARE, RANGE_FILE).await?;
    client.delete_directory_if_exists(SHARE, FOLDER).await?;
    client.delete_share_if_exists(SHARE).await?;
    client.delete_blob_if_exists(CONTAINER, FILE_NAME).await?;
    client.delete_container_if_exists(CONTAINER).await?;
    if let Err(e) = tokio::fs::remove_dir_all(&download_dir).await {
        warn!(error = %e, "temporary download folder not removed");
    }

    println!("\nWalkthrough complete!");
    Ok(())
}
